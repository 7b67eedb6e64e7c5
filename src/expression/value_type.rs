//! Value kinds known to the filter engine.

use std::fmt;

/// Tag identifying a check-specific custom type (e.g. a task status enum).
///
/// Custom types are stored as integers; the tag selects the converter used to
/// translate textual literals into the native representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomTag(pub &'static str);

impl CustomTag {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Kind of value an expression node produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    /// Seconds since the unix epoch
    Date,
    Custom(CustomTag),
}

impl ValueType {
    /// Integer-backed types: plain ints, booleans, dates and custom enums
    pub fn is_int(&self) -> bool {
        matches!(
            self,
            ValueType::Int | ValueType::Bool | ValueType::Date | ValueType::Custom(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ValueType::Float)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ValueType::String)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ValueType::Custom(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Date => write!(f, "date"),
            ValueType::Custom(tag) => write!(f, "custom:{}", tag.name()),
        }
    }
}
