use crate::context::{EvaluationContext, PerformanceCollector};
use crate::expression::{evaluate, Node};
use crate::filter::FilterError;
use crate::parser::parse_expression;
use crate::registry::AttributeRegistry;

/// A parsed filter expression bound against one registry.
///
/// A root that needs no object is evaluated once at compile time and the
/// result reused for every object.
#[derive(Debug, Clone)]
pub struct BoundExpression {
    source: String,
    node: Node,
    constant: Option<bool>,
}

impl BoundExpression {
    pub fn compile<T>(
        source: &str,
        registry: &AttributeRegistry<T>,
        ctx: &mut EvaluationContext,
    ) -> Result<Self, FilterError> {
        let mut node = parse_expression(source).map_err(|e| FilterError::Parse {
            expression: source.to_string(),
            message: e.to_string(),
        })?;
        if !node.bind(registry, ctx) {
            return Err(FilterError::Bind {
                expression: source.to_string(),
                message: ctx.get_errors(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            node,
            constant: None,
        })
    }

    /// Collect threshold samples; must run before [`Self::fold`]
    pub fn find_performance_data(
        &self,
        ctx: &EvaluationContext,
        collector: &mut PerformanceCollector,
    ) -> bool {
        self.node.find_performance_data(ctx, collector)
    }

    /// Fold static sub-trees and memoize a static root
    pub fn fold<T>(&mut self, registry: &AttributeRegistry<T>, ctx: &mut EvaluationContext) {
        self.node.fold_constants(registry, ctx);
        if !self.node.require_object() {
            if let Node::Constant(result) = self.node {
                self.constant = Some(result);
            }
        }
    }

    pub fn matches<T>(
        &self,
        registry: &AttributeRegistry<T>,
        object: &T,
        ctx: &mut EvaluationContext,
    ) -> bool {
        match self.constant {
            Some(result) => result,
            None => evaluate(&self.node, registry, object, ctx),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }
}
