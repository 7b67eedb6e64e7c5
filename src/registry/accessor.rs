//! Typed accessors reading attribute values out of domain objects.

use thiserror::Error;

use crate::expression::Value;

/// Failure reading an attribute from a domain object
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("not supported by this object")]
    Unsupported,

    #[error("{0}")]
    Failed(String),
}

pub type AccessResult<T> = Result<T, AccessError>;

pub type StringAccessor<T> = Box<dyn Fn(&T) -> AccessResult<String> + Send + Sync>;
pub type IntAccessor<T> = Box<dyn Fn(&T) -> AccessResult<i64> + Send + Sync>;
pub type FloatAccessor<T> = Box<dyn Fn(&T) -> AccessResult<f64> + Send + Sync>;

/// Accessor stored in a registry entry
pub enum Accessor<T> {
    String(StringAccessor<T>),
    Int(IntAccessor<T>),
    Float(FloatAccessor<T>),
}

impl<T> Accessor<T> {
    pub fn read(&self, object: &T) -> AccessResult<Value> {
        match self {
            Accessor::String(f) => f(object).map(Value::String),
            Accessor::Int(f) => f(object).map(Value::Int),
            Accessor::Float(f) => f(object).map(Value::Float),
        }
    }
}
