//! Evaluation of bound filter expressions against domain objects.

use std::cmp::Ordering;

use chrono::Utc;

use crate::context::EvaluationContext;
use crate::expression::node::{AttributeRef, BuiltinFunction, Conversion, FunctionCall};
use crate::expression::{BinaryOperator, Node, UnaryOperator, Value, ValueType};
use crate::registry::AttributeRegistry;

/// Evaluator for bound expressions
pub struct ObjectEvaluator<'a, T> {
    registry: &'a AttributeRegistry<T>,
    /// `None` for object-free static evaluation
    object: Option<&'a T>,
}

impl<'a, T> ObjectEvaluator<'a, T> {
    pub fn new(registry: &'a AttributeRegistry<T>, object: &'a T) -> Self {
        Self {
            registry,
            object: Some(object),
        }
    }

    /// Evaluator for sub-trees that do not require an object
    pub fn without_object(registry: &'a AttributeRegistry<T>) -> Self {
        Self {
            registry,
            object: None,
        }
    }

    /// Evaluate a node as a predicate.
    ///
    /// Literals are not predicates and evaluate to false.
    pub fn evaluate(&self, node: &Node, ctx: &mut EvaluationContext) -> bool {
        match node {
            Node::String(_) | Node::Int(_) | Node::Float(_) | Node::List(_) => false,

            Node::Constant(b) => *b,

            Node::Binary {
                op: BinaryOperator::And,
                left,
                right,
            } => self.evaluate(left, ctx) && self.evaluate(right, ctx),

            Node::Binary {
                op: BinaryOperator::Or,
                left,
                right,
            } => self.evaluate(left, ctx) || self.evaluate(right, ctx),

            Node::Binary { op, left, right } if op.is_comparison() => {
                self.evaluate_comparison(*op, left, right, ctx)
            }

            Node::Unary {
                op: UnaryOperator::Not,
                operand,
            } => !self.evaluate(operand, ctx),

            // attributes, functions, arithmetic: truthiness of the value
            other => self.value(other, ctx).as_bool(),
        }
    }

    /// Compute the value of a node
    pub fn value(&self, node: &Node, ctx: &mut EvaluationContext) -> Value {
        match node {
            Node::String(s) => Value::String(s.value.clone()),

            Node::Int(i) => match i.value_type {
                ValueType::Float => Value::Float(i.value as f64),
                ValueType::Date if i.is_unsure => {
                    match Utc::now().timestamp().checked_add(i.value) {
                        Some(timestamp) => Value::Int(timestamp),
                        None => {
                            ctx.error(format!("Failed to convert: {}", i.value));
                            Value::Int(0)
                        }
                    }
                }
                _ => Value::Int(i.value),
            },

            Node::Float(f) => Value::Float(f.value),

            Node::Constant(b) => Value::bool(*b),

            Node::Attribute(attr) => self.attribute_value(attr, ctx),

            Node::List(items) => match items.first() {
                Some(first) => self.value(first, ctx),
                None => Value::Int(0),
            },

            Node::Binary { op, left, right } if op.is_arithmetic() => {
                let left_val = self.value(left, ctx);
                let right_val = self.value(right, ctx);
                evaluate_arithmetic(*op, left_val, right_val, ctx)
            }

            Node::Binary { .. } => Value::bool(self.evaluate(node, ctx)),

            Node::Unary {
                op: UnaryOperator::Minus,
                operand,
            } => match self.value(operand, ctx) {
                Value::Int(n) => Value::Int(n.wrapping_neg()),
                Value::Float(f) => Value::Float(-f),
                Value::String(s) => {
                    ctx.error(format!("Failed to convert: {}", s));
                    Value::Int(0)
                }
            },

            Node::Unary { .. } => Value::bool(self.evaluate(node, ctx)),

            Node::Function(call) => self.call_function(call, ctx),

            Node::Convert(conv) => self.convert(conv, ctx),
        }
    }

    fn attribute_value(&self, attr: &AttributeRef, ctx: &mut EvaluationContext) -> Value {
        let Some(binding) = attr.binding else {
            ctx.error(format!("Attribute not bound: {}", attr.name));
            return Value::Int(0);
        };
        let Some(object) = self.object else {
            ctx.error(format!("No object to read {} from", attr.name));
            return default_value(binding.value_type);
        };
        let result = match self.registry.attribute(binding.slot) {
            Some(attribute) => attribute.read(object),
            None => {
                ctx.error(format!("Attribute not bound: {}", attr.name));
                return default_value(binding.value_type);
            }
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                ctx.error(format!("Failed to read {}: {}", attr.name, err));
                default_value(binding.value_type)
            }
        }
    }

    fn convert(&self, conv: &Conversion, ctx: &mut EvaluationContext) -> Value {
        let Some(object) = self.object else {
            ctx.error(format!("No object to convert {} for", conv.operand));
            return Value::Int(0);
        };
        match self.registry.find_converter(conv.from, conv.target) {
            Some(converter) => {
                let converted = converter(object, ctx, conv.operand.as_ref());
                self.value(&converted, ctx)
            }
            None => {
                ctx.error(format!("No converter from {} to {}", conv.from, conv.target));
                Value::Int(0)
            }
        }
    }

    fn call_function(&self, call: &FunctionCall, ctx: &mut EvaluationContext) -> Value {
        let arg = match call.args.first() {
            Some(arg) => self.value(arg, ctx),
            None => Value::Int(0),
        };
        match (call.function, arg) {
            (Some(BuiltinFunction::Lower), Value::String(s)) => Value::String(s.to_lowercase()),
            (Some(BuiltinFunction::Upper), Value::String(s)) => Value::String(s.to_uppercase()),
            (Some(BuiltinFunction::Abs), Value::Int(n)) => Value::Int(n.wrapping_abs()),
            (Some(BuiltinFunction::Abs), Value::Float(f)) => Value::Float(f.abs()),
            (Some(_), arg) => {
                ctx.error(format!("Invalid argument to {}: {}", call.name, arg));
                arg
            }
            (None, arg) => {
                ctx.error(format!("Unknown function: {}", call.name));
                arg
            }
        }
    }

    fn evaluate_comparison(
        &self,
        op: BinaryOperator,
        left: &Node,
        right: &Node,
        ctx: &mut EvaluationContext,
    ) -> bool {
        match op {
            BinaryOperator::In | BinaryOperator::NotIn => {
                let needle = self.value(left, ctx);
                let found = right.get_list_value().into_iter().any(|item| {
                    let candidate = self.value(item, ctx);
                    compare_values(BinaryOperator::Eq, &needle, &candidate, ctx)
                });
                found == (op == BinaryOperator::In)
            }

            BinaryOperator::Like | BinaryOperator::NotLike => {
                let haystack = self.value(left, ctx).to_string();
                let pattern = self.value(right, ctx).to_string();
                haystack.contains(&pattern) == (op == BinaryOperator::Like)
            }

            _ => {
                let left_val = self.value(left, ctx);
                let right_val = self.value(right, ctx);
                compare_values(op, &left_val, &right_val, ctx)
            }
        }
    }
}

fn default_value(value_type: ValueType) -> Value {
    match value_type {
        ValueType::String => Value::String(String::new()),
        ValueType::Float => Value::Float(0.0),
        _ => Value::Int(0),
    }
}

/// Parse a string operand into the numeric family of the other operand
fn coerce(value: &Value, like: &Value, ctx: &mut EvaluationContext) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    let parsed = match like {
        Value::Float(_) => s.trim().parse::<f64>().ok().map(Value::Float),
        _ => s
            .trim()
            .parse::<i64>()
            .ok()
            .map(Value::Int)
            .or_else(|| s.trim().parse::<f64>().ok().map(Value::Float)),
    };
    parsed.unwrap_or_else(|| {
        ctx.error(format!("Failed to convert: {}", s));
        Value::Int(0)
    })
}

fn compare_values(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    ctx: &mut EvaluationContext,
) -> bool {
    let ordering = match left.compare(right) {
        Some(ordering) => Some(ordering),
        None if left.is_string() != right.is_string() => {
            let left = coerce(left, right, ctx);
            let right = coerce(right, &left, ctx);
            left.compare(&right)
        }
        None => None,
    };

    // NaN compares unequal to everything
    let Some(ordering) = ordering else {
        return op == BinaryOperator::Ne;
    };

    match op {
        BinaryOperator::Eq => ordering == Ordering::Equal,
        BinaryOperator::Ne => ordering != Ordering::Equal,
        BinaryOperator::Lt => ordering == Ordering::Less,
        BinaryOperator::Le => ordering != Ordering::Greater,
        BinaryOperator::Gt => ordering == Ordering::Greater,
        BinaryOperator::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

fn evaluate_arithmetic(
    op: BinaryOperator,
    left: Value,
    right: Value,
    ctx: &mut EvaluationContext,
) -> Value {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinaryOperator::Add => Value::Int(a.wrapping_add(*b)),
            BinaryOperator::Sub => Value::Int(a.wrapping_sub(*b)),
            BinaryOperator::Mul => Value::Int(a.wrapping_mul(*b)),
            BinaryOperator::Div if *b == 0 => {
                ctx.error("Division by zero");
                Value::Int(0)
            }
            BinaryOperator::Div => Value::Int(a.wrapping_div(*b)),
            _ => Value::Int(0),
        },
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => match op {
                BinaryOperator::Add => Value::Float(a + b),
                BinaryOperator::Sub => Value::Float(a - b),
                BinaryOperator::Mul => Value::Float(a * b),
                BinaryOperator::Div if b == 0.0 => {
                    ctx.error("Division by zero");
                    Value::Float(0.0)
                }
                BinaryOperator::Div => Value::Float(a / b),
                _ => Value::Float(0.0),
            },
            _ => {
                ctx.error(format!(
                    "Invalid operand types for operator {}: {} and {}",
                    op.as_str(),
                    left,
                    right
                ));
                Value::Int(0)
            }
        },
    }
}

impl Node {
    /// Replace object-independent predicate sub-trees by their result
    pub fn fold_constants<T>(&mut self, registry: &AttributeRegistry<T>, ctx: &mut EvaluationContext) {
        if self.can_evaluate() && self.static_evaluate() {
            let result = ObjectEvaluator::without_object(registry).evaluate(self, ctx);
            ctx.debug(&format!("Folded {} to {}", self, result));
            *self = Node::Constant(result);
            return;
        }
        match self {
            Node::Binary { left, right, .. } => {
                left.fold_constants(registry, ctx);
                right.fold_constants(registry, ctx);
            }
            Node::Unary { operand, .. } => operand.fold_constants(registry, ctx),
            _ => {}
        }
    }
}

/// Evaluate a bound filter against one object
pub fn evaluate<T>(
    node: &Node,
    registry: &AttributeRegistry<T>,
    object: &T,
    ctx: &mut EvaluationContext,
) -> bool {
    ObjectEvaluator::new(registry, object).evaluate(node, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::CustomTag;
    use crate::registry::AccessError;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Job {
        name: String,
        exit_code: i64,
        load: f64,
        status: i64,
    }

    const STATUS: ValueType = ValueType::Custom(CustomTag::new("job_status"));

    fn job(exit_code: i64) -> Job {
        Job {
            name: "backup".to_string(),
            exit_code,
            load: 0.75,
            status: 2,
        }
    }

    fn convert_status(_: &Job, ctx: &mut EvaluationContext, subject: &Node) -> Node {
        let text = subject
            .literal_value()
            .map(|v| v.to_string())
            .unwrap_or_default();
        match text.as_str() {
            "running" => Node::int(2),
            "ready" => Node::int(3),
            _ => {
                ctx.error(format!("Failed to convert: {}", text));
                Node::int(0)
            }
        }
    }

    fn registry() -> AttributeRegistry<Job> {
        let mut registry = AttributeRegistry::new();
        registry
            .add_string("name", |j: &Job| Ok(j.name.clone()), "")
            .unwrap()
            .add_int("exit_code", |j: &Job| Ok(j.exit_code), "")
            .unwrap()
            .add_float("load", |j: &Job| Ok(j.load), "")
            .unwrap()
            .add_int_typed("status", STATUS, |j: &Job| Ok(j.status), "")
            .unwrap()
            .add_int("broken", |_: &Job| Err(AccessError::Failed("access denied".into())), "")
            .unwrap()
            .add_int_typed("last_run", ValueType::Date, |_: &Job| Ok(Utc::now().timestamp() - 600), "")
            .unwrap()
            .add_converter(STATUS, convert_status)
            .unwrap();
        registry
    }

    fn eval(expr: Node, object: &Job) -> (bool, EvaluationContext) {
        let registry = registry();
        let mut expr = expr;
        let mut ctx = EvaluationContext::new();
        assert!(expr.bind(&registry, &mut ctx), "{}", ctx.get_errors());
        let result = evaluate(&expr, &registry, object, &mut ctx);
        (result, ctx)
    }

    #[test]
    fn test_literals_are_not_predicates() {
        let registry = registry();
        let evaluator = ObjectEvaluator::without_object(&registry);
        let mut ctx = EvaluationContext::new();
        assert!(!evaluator.evaluate(&Node::int(1), &mut ctx));
        assert!(!evaluator.evaluate(&Node::string("yes"), &mut ctx));
        assert_eq!(evaluator.value(&Node::float(1.5), &mut ctx), Value::Float(1.5));
    }

    #[test]
    fn test_integer_comparison() {
        let expr = Node::eq(Node::attribute("exit_code"), Node::int(0));
        assert!(eval(expr.clone(), &job(0)).0);
        assert!(!eval(expr, &job(1)).0);
    }

    #[test]
    fn test_promoted_comparison() {
        let (result, _) = eval(Node::lt(Node::attribute("load"), Node::int(1)), &job(0));
        assert!(result);
        let (result, _) = eval(Node::gt(Node::attribute("load"), Node::float(0.5)), &job(0));
        assert!(result);
    }

    #[test]
    fn test_string_coerced_at_compare_time() {
        let (result, ctx) = eval(Node::eq(Node::attribute("exit_code"), Node::string("3")), &job(3));
        assert!(result);
        assert!(!ctx.has_errors());

        let (result, ctx) = eval(Node::eq(Node::attribute("exit_code"), Node::string("x")), &job(0));
        assert!(result);
        assert_eq!(ctx.get_errors(), "Failed to convert: x");
    }

    #[test]
    fn test_custom_conversion() {
        let expr = Node::eq(Node::attribute("status"), Node::string("running"));
        assert!(eval(expr.clone(), &job(0)).0);

        let mut stopped = job(0);
        stopped.status = 3;
        assert!(!eval(expr, &stopped).0);
    }

    #[test]
    fn test_failed_conversion_reports_and_continues() {
        let expr = Node::eq(Node::attribute("status"), Node::string("not_a_status"));
        let (result, ctx) = eval(expr, &job(0));
        assert!(!result);
        assert!(ctx.has_errors());
        assert_eq!(ctx.get_errors(), "Failed to convert: not_a_status");
    }

    #[test]
    fn test_accessor_error_is_recorded() {
        let expr = Node::or(
            Node::eq(Node::attribute("broken"), Node::int(1)),
            Node::eq(Node::attribute("exit_code"), Node::int(0)),
        );
        let (result, ctx) = eval(expr, &job(0));
        assert!(result);
        assert_eq!(ctx.get_errors(), "Failed to read broken: access denied");
    }

    #[test]
    fn test_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry: AttributeRegistry<Job> = AttributeRegistry::new();
        registry
            .add_int("exit_code", |j: &Job| Ok(j.exit_code), "")
            .unwrap()
            .add_int(
                "expensive",
                move |_: &Job| {
                    counter.fetch_add(1, AtomicOrdering::SeqCst);
                    Err(AccessError::Failed("must not be called".into()))
                },
                "",
            )
            .unwrap();

        let mut expr = Node::and(
            Node::eq(Node::attribute("exit_code"), Node::int(5)),
            Node::eq(Node::attribute("expensive"), Node::int(1)),
        );
        let mut ctx = EvaluationContext::new();
        assert!(expr.bind(&registry, &mut ctx));
        assert!(!evaluate(&expr, &registry, &job(0), &mut ctx));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
        assert!(!ctx.has_errors());

        let mut expr = Node::or(
            Node::eq(Node::attribute("exit_code"), Node::int(0)),
            Node::eq(Node::attribute("expensive"), Node::int(1)),
        );
        assert!(expr.bind(&registry, &mut ctx));
        assert!(evaluate(&expr, &registry, &job(0), &mut ctx));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let registry = registry();
        let mut expr = Node::and(
            Node::gt(Node::attribute("load"), Node::float(0.5)),
            Node::not_expr(Node::eq(Node::attribute("name"), Node::string("restore"))),
        );
        assert!(expr.bind(&registry, &mut EvaluationContext::new()));
        let object = job(0);
        let first = evaluate(&expr, &registry, &object, &mut EvaluationContext::new());
        let second = evaluate(&expr, &registry, &object, &mut EvaluationContext::new());
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_in_and_like() {
        let expr = Node::binary_op(
            BinaryOperator::In,
            Node::attribute("status"),
            Node::list(vec![Node::string("ready"), Node::string("running")]),
        );
        assert!(eval(expr, &job(0)).0);

        let expr = Node::binary_op(
            BinaryOperator::NotIn,
            Node::attribute("exit_code"),
            Node::list(vec![Node::int(1), Node::int(2)]),
        );
        assert!(eval(expr, &job(0)).0);

        let expr = Node::binary_op(BinaryOperator::Like, Node::attribute("name"), Node::string("ack"));
        assert!(eval(expr, &job(0)).0);

        let expr = Node::binary_op(BinaryOperator::NotLike, Node::attribute("name"), Node::string("ack"));
        assert!(!eval(expr, &job(0)).0);
    }

    #[test]
    fn test_arithmetic_and_functions() {
        let expr = Node::eq(
            Node::binary_op(BinaryOperator::Mul, Node::attribute("exit_code"), Node::int(2)),
            Node::int(8),
        );
        assert!(eval(expr, &job(4)).0);

        let expr = Node::eq(
            Node::function("upper", vec![Node::attribute("name")]),
            Node::string("BACKUP"),
        );
        assert!(eval(expr, &job(0)).0);

        let expr = Node::eq(
            Node::function("abs", vec![Node::attribute("exit_code")]),
            Node::int(3),
        );
        assert!(eval(expr, &job(-3)).0);

        let (result, ctx) = eval(
            Node::eq(
                Node::binary_op(BinaryOperator::Div, Node::attribute("exit_code"), Node::int(0)),
                Node::int(0),
            ),
            &job(1),
        );
        assert!(result);
        assert_eq!(ctx.get_errors(), "Division by zero");
    }

    #[test]
    fn test_relative_time_literal() {
        // last run ten minutes ago
        let expr = Node::gt(Node::attribute("last_run"), Node::unsure_int(-3600));
        assert!(eval(expr, &job(0)).0);

        let expr = Node::gt(Node::attribute("last_run"), Node::unsure_int(-60));
        assert!(!eval(expr, &job(0)).0);
    }

    #[test]
    fn test_relative_time_overflow_is_reported() {
        let expr = Node::gt(Node::attribute("last_run"), Node::unsure_int(i64::MAX));
        let (_, ctx) = eval(expr, &job(0));
        assert_eq!(ctx.get_errors(), format!("Failed to convert: {}", i64::MAX));
    }

    #[test]
    fn test_unbound_attribute_fails_cleanly() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let expr = Node::eq(Node::attribute("exit_code"), Node::int(1));
        assert!(!evaluate(&expr, &registry, &job(1), &mut ctx));
        assert_eq!(ctx.get_errors(), "Attribute not bound: exit_code");
    }

    #[test]
    fn test_fold_constants() {
        let registry = registry();
        let mut ctx = EvaluationContext::new();
        let mut expr = Node::and(
            Node::eq(Node::int(1), Node::int(1)),
            Node::eq(Node::attribute("exit_code"), Node::int(0)),
        );
        assert!(expr.bind(&registry, &mut ctx));
        expr.fold_constants(&registry, &mut ctx);
        match &expr {
            Node::Binary { left, right, .. } => {
                assert_eq!(left.as_ref(), &Node::Constant(true));
                assert!(matches!(right.as_ref(), Node::Binary { .. }));
            }
            other => panic!("unexpected node {:?}", other),
        }
        assert!(evaluate(&expr, &registry, &job(0), &mut ctx));
    }
}
