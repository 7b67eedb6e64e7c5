//! Filter expression tree.

use std::fmt;

use crate::context::{EvaluationContext, PerformanceCollector};
use crate::expression::operator::{BinaryOperator, UnaryOperator};
use crate::expression::{Value, ValueType};

/// String literal
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub value: String,
    pub is_unsure: bool,
}

impl StringValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_unsure: false,
        }
    }

    pub fn infer_type(&self, _hint: Option<ValueType>) -> ValueType {
        ValueType::String
    }
}

/// Integer literal.
///
/// `value_type` starts out as `Int` (or `Bool` for `true`/`false`) and may be
/// promoted during binding; the stored value never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct IntValue {
    pub value: i64,
    pub value_type: ValueType,
    /// Relative time offset whose absolute value depends on when it is evaluated
    pub is_unsure: bool,
}

impl IntValue {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            value_type: ValueType::Int,
            is_unsure: false,
        }
    }

    pub fn unsure(value: i64) -> Self {
        Self {
            value,
            value_type: ValueType::Int,
            is_unsure: true,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            value: i64::from(value),
            value_type: ValueType::Bool,
            is_unsure: false,
        }
    }

    pub fn infer_type(&mut self, hint: Option<ValueType>) -> ValueType {
        if self.value_type == ValueType::Int {
            match hint {
                Some(ValueType::Float) => self.value_type = ValueType::Float,
                Some(ValueType::Date) if self.is_unsure => self.value_type = ValueType::Date,
                _ => {}
            }
        }
        self.value_type
    }
}

/// Floating point literal; never demoted to an integer
#[derive(Debug, Clone, PartialEq)]
pub struct FloatValue {
    pub value: f64,
    pub is_unsure: bool,
}

impl FloatValue {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            is_unsure: false,
        }
    }

    pub fn infer_type(&self, _hint: Option<ValueType>) -> ValueType {
        ValueType::Float
    }
}

/// Registry slot an attribute reference resolved to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeBinding {
    pub slot: usize,
    pub value_type: ValueType,
}

/// Reference to a named attribute of the evaluated object
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRef {
    pub name: String,
    pub binding: Option<AttributeBinding>,
}

impl AttributeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: None,
        }
    }

    /// `None` until bound
    pub fn value_type(&self) -> Option<ValueType> {
        self.binding.map(|b| b.value_type)
    }
}

/// Scalar functions callable from a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunction {
    Lower,
    Upper,
    Abs,
}

impl BuiltinFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lower" => Some(BuiltinFunction::Lower),
            "upper" => Some(BuiltinFunction::Upper),
            "abs" => Some(BuiltinFunction::Abs),
            _ => None,
        }
    }

    pub fn arity(&self) -> usize {
        1
    }
}

/// Function call, resolved to a builtin during binding
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Node>,
    pub function: Option<BuiltinFunction>,
}

/// Literal routed through a registry converter before comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub from: ValueType,
    pub target: ValueType,
    pub operand: Box<Node>,
}

/// Filter expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    String(StringValue),
    Int(IntValue),
    Float(FloatValue),

    Attribute(AttributeRef),

    /// Literal list, right hand side of `in` / `not in`
    List(Vec<Node>),

    Binary {
        op: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },

    Unary {
        op: UnaryOperator,
        operand: Box<Node>,
    },

    Function(FunctionCall),

    Convert(Conversion),

    /// Result of folding an object-independent predicate
    Constant(bool),
}

impl Node {
    pub fn string(value: impl Into<String>) -> Self {
        Node::String(StringValue::new(value))
    }

    pub fn int(value: i64) -> Self {
        Node::Int(IntValue::new(value))
    }

    pub fn unsure_int(value: i64) -> Self {
        Node::Int(IntValue::unsure(value))
    }

    pub fn boolean(value: bool) -> Self {
        Node::Int(IntValue::boolean(value))
    }

    pub fn float(value: f64) -> Self {
        Node::Float(FloatValue::new(value))
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Node::Attribute(AttributeRef::new(name))
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::List(items)
    }

    pub fn function(name: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Function(FunctionCall {
            name: name.into(),
            args,
            function: None,
        })
    }

    pub fn binary_op(op: BinaryOperator, left: Node, right: Node) -> Self {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary_op(op: UnaryOperator, operand: Node) -> Self {
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn and(left: Node, right: Node) -> Self {
        Self::binary_op(BinaryOperator::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Self {
        Self::binary_op(BinaryOperator::Or, left, right)
    }

    pub fn not_expr(operand: Node) -> Self {
        Self::unary_op(UnaryOperator::Not, operand)
    }

    pub fn eq(left: Node, right: Node) -> Self {
        Self::binary_op(BinaryOperator::Eq, left, right)
    }

    pub fn ne(left: Node, right: Node) -> Self {
        Self::binary_op(BinaryOperator::Ne, left, right)
    }

    pub fn lt(left: Node, right: Node) -> Self {
        Self::binary_op(BinaryOperator::Lt, left, right)
    }

    pub fn gt(left: Node, right: Node) -> Self {
        Self::binary_op(BinaryOperator::Gt, left, right)
    }

    /// Value of a literal leaf, `None` for every other node
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            Node::String(s) => Some(Value::String(s.value.clone())),
            Node::Int(i) => Some(Value::Int(i.value)),
            Node::Float(f) => Some(Value::Float(f.value)),
            _ => None,
        }
    }

    /// Scalars yield themselves, lists yield their elements
    pub fn get_list_value(&self) -> Vec<&Node> {
        match self {
            Node::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Whether this node is a predicate in its own right
    pub fn can_evaluate(&self) -> bool {
        match self {
            Node::Binary { op, .. } => !op.is_arithmetic(),
            Node::Unary { op, .. } => *op == UnaryOperator::Not,
            Node::Constant(_) => true,
            _ => false,
        }
    }

    /// Whether this node can be computed once without any object
    pub fn static_evaluate(&self) -> bool {
        match self {
            Node::String(_) | Node::Int(_) | Node::Float(_) | Node::Constant(_) => true,
            Node::Attribute(_) => false,
            Node::List(items) => items.iter().all(Node::static_evaluate),
            Node::Binary { left, right, .. } => left.static_evaluate() && right.static_evaluate(),
            Node::Unary { operand, .. } => operand.static_evaluate(),
            Node::Function(call) => call.args.iter().all(Node::static_evaluate),
            // converters take the object as input
            Node::Convert(_) => false,
        }
    }

    /// Whether evaluating this node reads the domain object
    pub fn require_object(&self) -> bool {
        match self {
            Node::String(_) | Node::Int(_) | Node::Float(_) | Node::Constant(_) => false,
            Node::Attribute(_) | Node::Convert(_) => true,
            Node::List(items) => items.iter().any(Node::require_object),
            Node::Binary { left, right, .. } => left.require_object() || right.require_object(),
            Node::Unary { operand, .. } => operand.require_object(),
            Node::Function(call) => call.args.iter().any(Node::require_object),
        }
    }

    /// Collect `(attribute, threshold)` samples from ordering comparisons.
    ///
    /// Returns true if this sub-tree contributed at least one sample.
    pub fn find_performance_data(
        &self,
        ctx: &EvaluationContext,
        collector: &mut PerformanceCollector,
    ) -> bool {
        match self {
            Node::Binary { op, left, right } if op.is_logical() => {
                let found_left = left.find_performance_data(ctx, collector);
                let found_right = right.find_performance_data(ctx, collector);
                found_left || found_right
            }
            Node::Binary { op, left, right } if op.is_ordering() => {
                let sample = match (left.as_ref(), right.as_ref()) {
                    (Node::Attribute(attr), other) | (other, Node::Attribute(attr)) => {
                        threshold_of(other).filter(|_| is_perf_attribute(attr)).map(|v| (attr, v))
                    }
                    _ => None,
                };
                match sample {
                    Some((attr, value)) => {
                        ctx.debug(&format!("Performance data candidate: {} ({})", attr.name, value));
                        collector.add(attr.name.clone(), value);
                        true
                    }
                    None => false,
                }
            }
            Node::Unary {
                op: UnaryOperator::Not,
                operand,
            } => operand.find_performance_data(ctx, collector),
            _ => false,
        }
    }
}

fn is_perf_attribute(attr: &AttributeRef) -> bool {
    matches!(attr.value_type(), Some(ValueType::Int) | Some(ValueType::Float))
}

fn threshold_of(node: &Node) -> Option<f64> {
    match node {
        Node::Int(i) if !i.is_unsure && i.value_type != ValueType::Bool => Some(i.value as f64),
        Node::Float(f) => Some(f.value),
        Node::Unary {
            op: UnaryOperator::Minus,
            operand,
        } => threshold_of(operand).map(|v| -v),
        _ => None,
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::String(s) => write!(f, "'{}'", s.value.replace('\'', "''")),
            Node::Int(i) if i.value_type == ValueType::Bool => {
                write!(f, "{}", if i.value != 0 { "true" } else { "false" })
            }
            Node::Int(i) => write!(f, "{}", i.value),
            Node::Float(v) => write!(f, "{}", v.value),
            Node::Attribute(attr) => write!(f, "{}", attr.name),
            Node::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Node::Binary { op, left, right } => write!(f, "({} {} {})", left, op.as_str(), right),
            Node::Unary {
                op: UnaryOperator::Not,
                operand,
            } => write!(f, "not {}", operand),
            Node::Unary { op, operand } => write!(f, "{}{}", op.as_str(), operand),
            Node::Function(call) => {
                write!(f, "{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Node::Convert(conv) => write!(f, "convert({})", conv.operand),
            Node::Constant(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_capabilities() {
        for node in [Node::string("x"), Node::int(1), Node::float(1.5)] {
            assert!(!node.can_evaluate());
            assert!(node.static_evaluate());
            assert!(!node.require_object());
            assert_eq!(node.get_list_value(), vec![&node]);
        }
    }

    #[test]
    fn test_list_value_of_list() {
        let list = Node::list(vec![Node::int(1), Node::int(2)]);
        let values: Vec<_> = list
            .get_list_value()
            .iter()
            .filter_map(|n| n.literal_value())
            .collect();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_int_promotion_is_monotonic() {
        let mut lit = IntValue::new(5);
        assert_eq!(lit.infer_type(Some(ValueType::Int)), ValueType::Int);
        assert_eq!(lit.infer_type(Some(ValueType::String)), ValueType::Int);
        assert_eq!(lit.infer_type(None), ValueType::Int);
        assert_eq!(lit.infer_type(Some(ValueType::Float)), ValueType::Float);
        assert_eq!(lit.value, 5);
        // once promoted it stays a float
        assert_eq!(lit.infer_type(Some(ValueType::Int)), ValueType::Float);
        assert_eq!(lit.infer_type(None), ValueType::Float);
    }

    #[test]
    fn test_float_and_string_ignore_hints() {
        let lit = FloatValue::new(2.5);
        assert_eq!(lit.infer_type(Some(ValueType::Int)), ValueType::Float);
        assert_eq!(lit.infer_type(None), ValueType::Float);

        let lit = StringValue::new("x");
        assert_eq!(lit.infer_type(Some(ValueType::Float)), ValueType::String);
        assert_eq!(lit.infer_type(Some(ValueType::Int)), ValueType::String);
    }

    #[test]
    fn test_unsure_int_adopts_date() {
        let mut lit = IntValue::unsure(-3600);
        assert_eq!(lit.infer_type(Some(ValueType::Date)), ValueType::Date);

        let mut sure = IntValue::new(10);
        assert_eq!(sure.infer_type(Some(ValueType::Date)), ValueType::Int);
    }

    #[test]
    fn test_composite_capabilities() {
        let expr = Node::and(
            Node::eq(Node::attribute("exit_code"), Node::int(0)),
            Node::eq(Node::int(1), Node::int(1)),
        );
        assert!(expr.can_evaluate());
        assert!(expr.require_object());
        assert!(!expr.static_evaluate());

        let constant = Node::eq(Node::int(1), Node::int(1));
        assert!(constant.static_evaluate());
        assert!(!constant.require_object());

        let arithmetic = Node::binary_op(BinaryOperator::Add, Node::int(1), Node::int(2));
        assert!(!arithmetic.can_evaluate());
    }

    #[test]
    fn test_display() {
        let expr = Node::and(
            Node::eq(Node::attribute("status"), Node::string("it's")),
            Node::not_expr(Node::binary_op(
                BinaryOperator::In,
                Node::attribute("code"),
                Node::list(vec![Node::int(1), Node::boolean(true)]),
            )),
        );
        assert_eq!(
            expr.to_string(),
            "((status = 'it''s') and not (code in (1, true)))"
        );
    }
}
