//! Converters translating literals into a custom type's native form.

use std::collections::HashMap;
use std::fmt;

use crate::context::EvaluationContext;
use crate::expression::{Node, ValueType};
use crate::registry::RegistryError;

/// Converter invoked when a literal meets an attribute of its target type.
///
/// Must report unknown symbols through the context and return a default.
pub type Converter<T> = Box<dyn Fn(&T, &mut EvaluationContext, &Node) -> Node + Send + Sync>;

/// Dispatch key: target type, optionally refined by the source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConverterKey {
    pub from: Option<ValueType>,
    pub to: ValueType,
}

impl fmt::Display for ConverterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(f, "{} -> {}", from, self.to),
            None => write!(f, "{}", self.to),
        }
    }
}

pub struct ConverterTable<T> {
    converters: HashMap<ConverterKey, Converter<T>>,
}

impl<T> ConverterTable<T> {
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: ConverterKey, converter: Converter<T>) -> Result<(), RegistryError> {
        if self.converters.contains_key(&key) {
            return Err(RegistryError::DuplicateConverter(key.to_string()));
        }
        self.converters.insert(key, converter);
        Ok(())
    }

    /// Exact `(from, to)` entry first, then the entry keyed on `to` alone
    pub fn find(&self, from: ValueType, to: ValueType) -> Option<&Converter<T>> {
        self.converters
            .get(&ConverterKey {
                from: Some(from),
                to,
            })
            .or_else(|| self.converters.get(&ConverterKey { from: None, to }))
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl<T> Default for ConverterTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
