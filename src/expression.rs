//! Filter expression trees.
//!
//! This module provides:
//! - The expression node tree and its literal values
//! - Binding against an attribute registry with type inference
//! - Evaluation of bound trees against domain objects

pub mod binder;
pub mod error;
pub mod eval;
pub mod node;
pub mod operator;
pub mod value;
pub mod value_type;

pub use binder::bind;
pub use error::{ExpressionError, ExpressionResult};
pub use eval::{evaluate, ObjectEvaluator};
pub use node::{AttributeRef, Conversion, FunctionCall, Node};
pub use operator::{BinaryOperator, UnaryOperator};
pub use value::Value;
pub use value_type::{CustomTag, ValueType};
