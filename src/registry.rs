//! Attribute registries: the coupling point between the generic filter engine
//! and a check module's domain objects.
//!
//! A check module builds one `AttributeRegistry` at setup time, registering a
//! typed accessor per attribute name and converters for its custom types. The
//! registry is immutable afterwards and shared by every evaluation.

pub mod accessor;
pub mod converter;

use std::collections::HashMap;

use thiserror::Error;

pub use accessor::{AccessError, AccessResult, Accessor, StringAccessor};
pub use converter::{Converter, ConverterKey, ConverterTable};

use crate::context::EvaluationContext;
use crate::expression::{Node, Value, ValueType};

/// Errors raised while building a registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Attribute already registered: {0}")]
    DuplicateAttribute(String),

    #[error("Human readable string already registered: {0}")]
    DuplicateHumanString(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Converter already registered: {0}")]
    DuplicateConverter(String),

    #[error("Attribute {name} cannot be stored as {value_type}")]
    InvalidType { name: String, value_type: ValueType },
}

/// Display-only rendering of an attribute
pub struct HumanString<T> {
    pub accessor: StringAccessor<T>,
    pub description: String,
}

/// A registered attribute
pub struct Attribute<T> {
    pub name: String,
    pub value_type: ValueType,
    pub description: String,
    accessor: Accessor<T>,
    human: Option<HumanString<T>>,
}

impl<T> Attribute<T> {
    pub fn read(&self, object: &T) -> AccessResult<Value> {
        self.accessor.read(object)
    }

    /// Human readable string if one is registered, else the plain value
    pub fn render(&self, object: &T) -> AccessResult<String> {
        match &self.human {
            Some(human) => (human.accessor)(object),
            None => self.read(object).map(|v| v.to_string()),
        }
    }
}

/// Documentation line for one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDoc {
    pub name: String,
    pub value_type: ValueType,
    pub description: String,
    /// Description of the human readable rendering, if one is registered
    pub human: Option<String>,
}

pub struct AttributeRegistry<T> {
    attributes: Vec<Attribute<T>>,
    index: HashMap<String, usize>,
    converters: ConverterTable<T>,
    /// Date attribute `max_age` is checked against
    age_attribute: Option<usize>,
}

impl<T> AttributeRegistry<T> {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            index: HashMap::new(),
            converters: ConverterTable::new(),
            age_attribute: None,
        }
    }

    pub fn add_string<F>(
        &mut self,
        name: &str,
        accessor: F,
        description: &str,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T) -> AccessResult<String> + Send + Sync + 'static,
    {
        self.insert(
            name,
            ValueType::String,
            Accessor::String(Box::new(accessor)),
            description,
        )
    }

    pub fn add_int<F>(
        &mut self,
        name: &str,
        accessor: F,
        description: &str,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T) -> AccessResult<i64> + Send + Sync + 'static,
    {
        self.add_int_typed(name, ValueType::Int, accessor, description)
    }

    /// Integer attribute with custom semantics: a bool, a date or a custom enum
    pub fn add_int_typed<F>(
        &mut self,
        name: &str,
        value_type: ValueType,
        accessor: F,
        description: &str,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T) -> AccessResult<i64> + Send + Sync + 'static,
    {
        if !value_type.is_int() {
            return Err(RegistryError::InvalidType {
                name: name.to_string(),
                value_type,
            });
        }
        self.insert(name, value_type, Accessor::Int(Box::new(accessor)), description)
    }

    pub fn add_float<F>(
        &mut self,
        name: &str,
        accessor: F,
        description: &str,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T) -> AccessResult<f64> + Send + Sync + 'static,
    {
        self.insert(
            name,
            ValueType::Float,
            Accessor::Float(Box::new(accessor)),
            description,
        )
    }

    /// Attach a display rendering to an already registered attribute
    pub fn add_human_string<F>(
        &mut self,
        name: &str,
        accessor: F,
        description: &str,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T) -> AccessResult<String> + Send + Sync + 'static,
    {
        let slot = *self
            .index
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAttribute(name.to_string()))?;
        let attribute = &mut self.attributes[slot];
        if attribute.human.is_some() {
            return Err(RegistryError::DuplicateHumanString(name.to_string()));
        }
        attribute.human = Some(HumanString {
            accessor: Box::new(accessor),
            description: description.to_string(),
        });
        Ok(self)
    }

    /// Converter for literals compared against attributes of `to`
    pub fn add_converter<F>(&mut self, to: ValueType, converter: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T, &mut EvaluationContext, &Node) -> Node + Send + Sync + 'static,
    {
        self.converters
            .insert(ConverterKey { from: None, to }, Box::new(converter))?;
        Ok(self)
    }

    /// Converter restricted to literals of type `from`
    pub fn add_converter_from<F>(
        &mut self,
        from: ValueType,
        to: ValueType,
        converter: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&T, &mut EvaluationContext, &Node) -> Node + Send + Sync + 'static,
    {
        self.converters.insert(
            ConverterKey {
                from: Some(from),
                to,
            },
            Box::new(converter),
        )?;
        Ok(self)
    }

    /// Mark a registered date attribute as the object's age
    pub fn set_age_attribute(&mut self, name: &str) -> Result<&mut Self, RegistryError> {
        let slot = *self
            .index
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAttribute(name.to_string()))?;
        let value_type = self.attributes[slot].value_type;
        if value_type != ValueType::Date {
            return Err(RegistryError::InvalidType {
                name: name.to_string(),
                value_type,
            });
        }
        self.age_attribute = Some(slot);
        Ok(self)
    }

    pub fn age_attribute(&self) -> Option<&str> {
        self.age_attribute
            .and_then(|slot| self.attributes.get(slot))
            .map(|attr| attr.name.as_str())
    }

    fn insert(
        &mut self,
        name: &str,
        value_type: ValueType,
        accessor: Accessor<T>,
        description: &str,
    ) -> Result<&mut Self, RegistryError> {
        if self.index.contains_key(name) {
            return Err(RegistryError::DuplicateAttribute(name.to_string()));
        }
        self.index.insert(name.to_string(), self.attributes.len());
        self.attributes.push(Attribute {
            name: name.to_string(),
            value_type,
            description: description.to_string(),
            accessor,
            human: None,
        });
        Ok(self)
    }

    /// Exact name lookup returning the slot used by bound attribute nodes
    pub fn lookup(&self, name: &str) -> Option<(usize, &Attribute<T>)> {
        self.index
            .get(name)
            .map(|&slot| (slot, &self.attributes[slot]))
    }

    pub fn attribute(&self, slot: usize) -> Option<&Attribute<T>> {
        self.attributes.get(slot)
    }

    pub fn find_converter(&self, from: ValueType, to: ValueType) -> Option<&Converter<T>> {
        self.converters.find(from, to)
    }

    pub fn has_converter(&self, from: ValueType, to: ValueType) -> bool {
        self.find_converter(from, to).is_some()
    }

    /// Render an attribute by name for output templates
    pub fn render(&self, name: &str, object: &T) -> Option<AccessResult<String>> {
        self.lookup(name).map(|(_, attr)| attr.render(object))
    }

    pub fn describe(&self) -> Vec<AttributeDoc> {
        self.attributes
            .iter()
            .map(|attr| AttributeDoc {
                name: attr.name.clone(),
                value_type: attr.value_type,
                description: attr.description.clone(),
                human: attr.human.as_ref().map(|human| human.description.clone()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<T> Default for AttributeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
