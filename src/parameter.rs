//! Command parameters.

use crate::error::{Error, Result};
use crate::types::{DbType, Value};

/// A command parameter: a value, an optional name and an optional type.
///
/// Names are stored without their `@` prefix. Parameters without an
/// explicit type have one inferred from their value when bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: Option<String>,
    value: Value,
    db_type: Option<DbType>,
}

impl Parameter {
    /// Positional parameter.
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
            db_type: None,
        }
    }

    /// Named parameter. A leading `@` in `name` is stripped.
    pub fn named(name: &str, value: impl Into<Value>) -> Self {
        let name = strip_prefix(name);
        Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            value: value.into(),
            db_type: None,
        }
    }

    /// Set an explicit type.
    pub fn with_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    /// Set an explicit type from a legacy type tag.
    pub fn with_legacy_type(self, tag: i32) -> Result<Self> {
        Ok(self.with_type(DbType::from_legacy(tag)?))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Explicit type, if one was set.
    pub fn explicit_type(&self) -> Option<DbType> {
        self.db_type
    }

    /// Explicit type, or the type inferred from the value.
    pub fn db_type(&self) -> DbType {
        self.db_type.unwrap_or_else(|| DbType::infer(&self.value))
    }

    /// Whether `name` (with or without prefix) refers to this parameter.
    pub fn matches(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(strip_prefix(name)))
    }
}

fn strip_prefix(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

/// How a command's parameters are referenced from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    /// `$1..$n`, in collection order.
    Positional,
    /// `@name`.
    Named,
}

/// Ordered parameter collection of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    items: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn add(&mut self, parameter: Parameter) -> &mut Parameter {
        self.items.push(parameter);
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    /// Append a named parameter.
    pub fn add_with_value(&mut self, name: &str, value: impl Into<Value>) -> &mut Parameter {
        self.add(Parameter::named(name, value))
    }

    /// Append a named parameter with an explicit type.
    pub fn add_typed(
        &mut self,
        name: &str,
        db_type: DbType,
        value: impl Into<Value>,
    ) -> &mut Parameter {
        self.add(Parameter::named(name, value).with_type(db_type))
    }

    /// Append a positional parameter.
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Parameter {
        self.add(Parameter::positional(value))
    }

    /// Look up a named parameter (prefix optional, case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.items.iter().find(|p| p.matches(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.items.iter_mut().find(|p| p.matches(name))
    }

    /// Position of a named parameter.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|p| p.matches(name))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Style shared by all parameters, `None` if there are none.
    ///
    /// Returns [`Error::MixedParameterStyle`] if named and positional
    /// parameters are combined.
    pub fn style(&self) -> Result<Option<ParameterStyle>> {
        let named = self.items.iter().filter(|p| p.name.is_some()).count();
        match named {
            0 if self.items.is_empty() => Ok(None),
            0 => Ok(Some(ParameterStyle::Positional)),
            n if n == self.items.len() => Ok(Some(ParameterStyle::Named)),
            _ => Err(Error::MixedParameterStyle),
        }
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
