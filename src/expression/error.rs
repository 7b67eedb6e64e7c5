//! Error types for binding filter expressions.

use crate::expression::ValueType;
use std::fmt;

/// Errors raised while binding an expression against a registry
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Attribute name not present in the registry
    UnknownAttribute { name: String },

    /// Attribute evaluated before it was bound
    UnboundAttribute { name: String },

    /// Invalid operand types for operator
    InvalidOperandTypes {
        operator: String,
        left_type: Option<ValueType>,
        right_type: Option<ValueType>,
    },

    /// Invalid function name
    UnknownFunction { name: String },

    /// Wrong number of function arguments
    FunctionArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// No converter registered for a conversion inserted into the tree
    MissingConverter { from: ValueType, to: ValueType },
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::UnknownAttribute { name } => {
                write!(f, "Unknown attribute: {}", name)
            }

            ExpressionError::UnboundAttribute { name } => {
                write!(f, "Attribute not bound: {}", name)
            }

            ExpressionError::InvalidOperandTypes {
                operator,
                left_type,
                right_type,
            } => {
                write!(
                    f,
                    "Invalid operand types for operator {}: left={}, right={}",
                    operator,
                    display_type(left_type),
                    display_type(right_type)
                )
            }

            ExpressionError::UnknownFunction { name } => {
                write!(f, "Unknown function: {}", name)
            }

            ExpressionError::FunctionArgumentCount {
                function,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Function {} expects {} arguments, got {}",
                    function, expected, actual
                )
            }

            ExpressionError::MissingConverter { from, to } => {
                write!(f, "No converter from {} to {}", from, to)
            }
        }
    }
}

fn display_type(value_type: &Option<ValueType>) -> String {
    value_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl std::error::Error for ExpressionError {}

/// Result type for expression binding
pub type ExpressionResult<T> = Result<T, ExpressionError>;
