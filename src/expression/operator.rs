//! Operator definitions for filter expressions.

use crate::expression::ValueType;

/// Binary operators supported in filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Substring match
    Like,
    NotLike,

    // List membership, right operand is a list node
    In,
    NotIn,

    // Logical
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div
        )
    }

    /// Operators producing a boolean from two scalar operands
    pub fn is_comparison(&self) -> bool {
        !self.is_logical() && !self.is_arithmetic()
    }

    /// Numeric ordering operators, the ones that carry a threshold
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge
        )
    }

    /// Get the output type of this operator given resolved operand types
    pub fn output_type(&self, left: ValueType, right: ValueType) -> Option<ValueType> {
        match self {
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div => match (left, right) {
                (l, r) if l.is_float() && r.is_numeric() => Some(ValueType::Float),
                (l, r) if l.is_numeric() && r.is_float() => Some(ValueType::Float),
                (l, r) if l.is_int() && r.is_int() => Some(ValueType::Int),
                _ => None,
            },

            BinaryOperator::Like | BinaryOperator::NotLike => match (left, right) {
                (ValueType::String, ValueType::String) => Some(ValueType::Bool),
                _ => None,
            },

            // Everything else compares, coercing at evaluation time when needed
            _ => Some(ValueType::Bool),
        }
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Like => "like",
            BinaryOperator::NotLike => "not like",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "not in",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

/// Unary operators supported in filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl UnaryOperator {
    /// Get the output type of this operator given the operand type
    pub fn output_type(&self, operand: ValueType) -> Option<ValueType> {
        match self {
            UnaryOperator::Not => Some(ValueType::Bool),
            UnaryOperator::Minus => match operand {
                ValueType::Float => Some(ValueType::Float),
                t if t.is_int() => Some(ValueType::Int),
                _ => None,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "not",
            UnaryOperator::Minus => "-",
        }
    }
}
