//! Binding filter expressions against an attribute registry.
//!
//! Binding resolves every attribute name to a registry slot, then infers types
//! bottom-up so literals adapt to the attribute they are compared with.

use crate::context::EvaluationContext;
use crate::expression::node::{AttributeBinding, BuiltinFunction, Conversion};
use crate::expression::{ExpressionError, ExpressionResult, Node, UnaryOperator, ValueType};
use crate::registry::AttributeRegistry;

impl Node {
    /// Bind this tree against `registry`.
    ///
    /// Returns false when a name cannot be resolved or operands do not type
    /// check; the reason is left in the context's error slot. Binding an
    /// already bound tree again is a no-op.
    pub fn bind<T>(&mut self, registry: &AttributeRegistry<T>, ctx: &mut EvaluationContext) -> bool {
        let result = self
            .resolve(registry)
            .and_then(|_| self.check(registry, None));
        match result {
            Ok(value_type) => {
                ctx.debug(&format!("Bound {} as {}", self, value_type));
                true
            }
            Err(err) => {
                ctx.error(err.to_string());
                false
            }
        }
    }

    /// Infer the type of this node given the type expected by its context.
    ///
    /// `None` means unresolved: the tree (or part of it) is not bound.
    pub fn infer_type<T>(
        &mut self,
        registry: &AttributeRegistry<T>,
        hint: Option<ValueType>,
    ) -> Option<ValueType> {
        self.check(registry, hint).ok()
    }

    fn resolve<T>(&mut self, registry: &AttributeRegistry<T>) -> ExpressionResult<()> {
        match self {
            Node::String(_) | Node::Int(_) | Node::Float(_) | Node::Constant(_) => Ok(()),

            Node::Attribute(attr) => {
                let (slot, attribute) =
                    registry
                        .lookup(&attr.name)
                        .ok_or_else(|| ExpressionError::UnknownAttribute {
                            name: attr.name.clone(),
                        })?;
                attr.binding = Some(AttributeBinding {
                    slot,
                    value_type: attribute.value_type,
                });
                Ok(())
            }

            Node::List(items) => items.iter_mut().try_for_each(|n| n.resolve(registry)),

            Node::Binary { left, right, .. } => {
                left.resolve(registry)?;
                right.resolve(registry)
            }

            Node::Unary { operand, .. } => operand.resolve(registry),

            Node::Function(call) => {
                let function = BuiltinFunction::from_name(&call.name).ok_or_else(|| {
                    ExpressionError::UnknownFunction {
                        name: call.name.clone(),
                    }
                })?;
                if call.args.len() != function.arity() {
                    return Err(ExpressionError::FunctionArgumentCount {
                        function: call.name.clone(),
                        expected: function.arity(),
                        actual: call.args.len(),
                    });
                }
                call.function = Some(function);
                call.args.iter_mut().try_for_each(|n| n.resolve(registry))
            }

            Node::Convert(conv) => {
                if !registry.has_converter(conv.from, conv.target) {
                    return Err(ExpressionError::MissingConverter {
                        from: conv.from,
                        to: conv.target,
                    });
                }
                conv.operand.resolve(registry)
            }
        }
    }

    fn check<T>(
        &mut self,
        registry: &AttributeRegistry<T>,
        hint: Option<ValueType>,
    ) -> ExpressionResult<ValueType> {
        match self {
            Node::String(s) => Ok(s.infer_type(hint)),
            Node::Int(i) => Ok(i.infer_type(hint)),
            Node::Float(f) => Ok(f.infer_type(hint)),
            Node::Constant(_) => Ok(ValueType::Bool),

            Node::Attribute(attr) => {
                attr.value_type()
                    .ok_or_else(|| ExpressionError::UnboundAttribute {
                        name: attr.name.clone(),
                    })
            }

            Node::List(items) => {
                let mut list_type = hint;
                for item in items.iter_mut() {
                    let item_type = coerce_operand(item, hint, registry)?;
                    list_type.get_or_insert(item_type);
                }
                Ok(list_type.unwrap_or(ValueType::String))
            }

            Node::Binary { op, left, right } => {
                let op = *op;
                if op.is_logical() {
                    left.check(registry, Some(ValueType::Bool))?;
                    right.check(registry, Some(ValueType::Bool))?;
                    return Ok(ValueType::Bool);
                }

                let left_type = left.check(registry, None)?;
                let right_type = coerce_operand(right, Some(left_type), registry)?;
                let left_type = coerce_operand(left, Some(right_type), registry)?;

                op.output_type(left_type, right_type)
                    .ok_or_else(|| ExpressionError::InvalidOperandTypes {
                        operator: op.as_str().to_string(),
                        left_type: Some(left_type),
                        right_type: Some(right_type),
                    })
            }

            Node::Unary { op, operand } => {
                let op = *op;
                let operand_hint = match op {
                    UnaryOperator::Not => Some(ValueType::Bool),
                    UnaryOperator::Minus => hint,
                };
                let operand_type = operand.check(registry, operand_hint)?;
                op.output_type(operand_type)
                    .ok_or_else(|| ExpressionError::InvalidOperandTypes {
                        operator: op.as_str().to_string(),
                        left_type: Some(operand_type),
                        right_type: None,
                    })
            }

            Node::Function(call) => {
                let function = call.function.ok_or_else(|| ExpressionError::UnknownFunction {
                    name: call.name.clone(),
                })?;
                let actual = call.args.len();
                let arg = call.args.first_mut().ok_or_else(|| {
                    ExpressionError::FunctionArgumentCount {
                        function: call.name.clone(),
                        expected: function.arity(),
                        actual,
                    }
                })?;
                let arg_type = arg.check(registry, None)?;
                let result = match function {
                    BuiltinFunction::Lower | BuiltinFunction::Upper if arg_type.is_string() => {
                        Some(ValueType::String)
                    }
                    BuiltinFunction::Abs if arg_type.is_float() => Some(ValueType::Float),
                    BuiltinFunction::Abs if arg_type.is_int() => Some(ValueType::Int),
                    _ => None,
                };
                result.ok_or_else(|| ExpressionError::InvalidOperandTypes {
                    operator: call.name.clone(),
                    left_type: Some(arg_type),
                    right_type: None,
                })
            }

            Node::Convert(conv) => {
                conv.operand.check(registry, None)?;
                Ok(conv.target)
            }
        }
    }
}

/// Type `node` against the type of the opposite operand.
///
/// A string literal facing a custom type that has a converter is wrapped in a
/// conversion node; everything else is re-inferred with the other type as hint.
fn coerce_operand<T>(
    node: &mut Node,
    other: Option<ValueType>,
    registry: &AttributeRegistry<T>,
) -> ExpressionResult<ValueType> {
    let own = node.check(registry, None)?;
    if let Some(target) = other {
        if target.is_custom()
            && matches!(node, Node::String(_))
            && registry.has_converter(own, target)
        {
            let operand = std::mem::replace(node, Node::Constant(false));
            *node = Node::Convert(Conversion {
                from: own,
                target,
                operand: Box::new(operand),
            });
            return Ok(target);
        }
    }
    node.check(registry, other)
}

/// Bind `node` against `registry`; see [`Node::bind`]
pub fn bind<T>(node: &mut Node, registry: &AttributeRegistry<T>, ctx: &mut EvaluationContext) -> bool {
    node.bind(registry, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{BinaryOperator, CustomTag};

    struct Task {
        exit_code: i64,
        load: f64,
        status: i64,
    }

    const STATUS: ValueType = ValueType::Custom(CustomTag::new("status"));

    fn registry() -> AttributeRegistry<Task> {
        let mut registry = AttributeRegistry::new();
        registry
            .add_int("exit_code", |t: &Task| Ok(t.exit_code), "")
            .unwrap()
            .add_float("load", |t: &Task| Ok(t.load), "")
            .unwrap()
            .add_int_typed("status", STATUS, |t: &Task| Ok(t.status), "")
            .unwrap()
            .add_string("title", |_: &Task| Ok("t".to_string()), "")
            .unwrap()
            .add_converter(STATUS, |_: &Task, _: &mut EvaluationContext, _: &Node| Node::int(2))
            .unwrap();
        registry
    }

    #[test]
    fn test_bind_resolves_attributes() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::eq(Node::attribute("exit_code"), Node::int(0));
        assert!(expr.bind(&registry, &mut ctx));

        match &expr {
            Node::Binary { left, .. } => match left.as_ref() {
                Node::Attribute(attr) => {
                    assert_eq!(
                        attr.binding,
                        Some(AttributeBinding {
                            slot: 0,
                            value_type: ValueType::Int
                        })
                    );
                }
                other => panic!("unexpected node {:?}", other),
            },
            other => panic!("unexpected node {:?}", other),
        }
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_unknown_attribute_fails_bind() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::eq(Node::attribute("bogus"), Node::int(1));
        assert!(!bind(&mut expr, &registry, &mut ctx));
        assert_eq!(ctx.get_errors(), "Unknown attribute: bogus");
    }

    #[test]
    fn test_unbound_reports_unresolved() {
        let registry = registry();
        let mut expr = Node::attribute("exit_code");
        assert_eq!(expr.infer_type(&registry, None), None);
        assert!(expr.bind(&registry, &mut EvaluationContext::new()));
        assert_eq!(expr.infer_type(&registry, None), Some(ValueType::Int));
    }

    #[test]
    fn test_int_literal_promoted_against_float_attribute() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::gt(Node::int(1), Node::attribute("load"));
        assert!(expr.bind(&registry, &mut ctx));
        match &expr {
            Node::Binary { left, .. } => match left.as_ref() {
                Node::Int(lit) => {
                    assert_eq!(lit.value_type, ValueType::Float);
                    assert_eq!(lit.value, 1);
                }
                other => panic!("unexpected node {:?}", other),
            },
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_string_literal_wrapped_for_custom_type() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::eq(Node::attribute("status"), Node::string("running"));
        assert!(expr.bind(&registry, &mut ctx));
        let bound = expr.clone();
        match &expr {
            Node::Binary { right, .. } => assert!(matches!(
                right.as_ref(),
                Node::Convert(Conversion { target, .. }) if *target == STATUS
            )),
            other => panic!("unexpected node {:?}", other),
        }

        // idempotent
        assert!(expr.bind(&registry, &mut ctx));
        assert_eq!(expr, bound);
    }

    #[test]
    fn test_in_list_elements_wrapped() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::binary_op(
            BinaryOperator::In,
            Node::attribute("status"),
            Node::list(vec![Node::string("running"), Node::int(3)]),
        );
        assert!(expr.bind(&registry, &mut ctx));
        match &expr {
            Node::Binary { right, .. } => match right.as_ref() {
                Node::List(items) => {
                    assert!(matches!(items[0], Node::Convert(_)));
                    assert!(matches!(items[1], Node::Int(_)));
                }
                other => panic!("unexpected node {:?}", other),
            },
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_invalid_operands_fail_bind() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::gt(
            Node::binary_op(BinaryOperator::Add, Node::attribute("title"), Node::int(1)),
            Node::int(2),
        );
        assert!(!expr.bind(&registry, &mut ctx));
        assert_eq!(
            ctx.get_errors(),
            "Invalid operand types for operator +: left=string, right=int"
        );
    }

    #[test]
    fn test_functions() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();

        let mut expr = Node::eq(
            Node::function("lower", vec![Node::attribute("title")]),
            Node::string("t"),
        );
        assert!(expr.bind(&registry, &mut ctx));

        let mut expr = Node::eq(Node::function("nope", vec![]), Node::int(1));
        assert!(!expr.bind(&registry, &mut ctx));
        assert_eq!(ctx.get_errors(), "Unknown function: nope");

        let mut expr = Node::eq(
            Node::function("abs", vec![Node::int(1), Node::int(2)]),
            Node::int(1),
        );
        assert!(!expr.bind(&registry, &mut ctx));
        assert_eq!(ctx.get_errors(), "Function abs expects 1 arguments, got 2");
    }

    #[test]
    fn test_string_against_plain_int_is_not_wrapped() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::eq(Node::attribute("exit_code"), Node::string("0"));
        assert!(expr.bind(&registry, &mut ctx));
        match &expr {
            Node::Binary { right, .. } => assert!(matches!(right.as_ref(), Node::String(_))),
            other => panic!("unexpected node {:?}", other),
        }
    }
}
