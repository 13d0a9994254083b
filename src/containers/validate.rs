//! Value validation against the live schema
//!
//! A value entering a container is checked against the type declared at the
//! container's path, unwrapped once per container layer between the field
//! and the value. List and dict values are rebuilt as validating containers
//! one level deeper, element by element.

use std::collections::BTreeMap;

use super::dict::ValidatingDict;
use super::list::ValidatingList;
use crate::schema::{FieldType, SchemaError, SchemaHandle, SchemaResult, Value};

/// Where a container sits in the schema
#[derive(Debug, Clone)]
pub struct Binding {
    path: String,
    schema: SchemaHandle,
    level: usize,
}

impl Binding {
    pub(crate) fn new(path: impl Into<String>, schema: SchemaHandle, level: usize) -> Self {
        Self {
            path: path.into(),
            schema,
            level,
        }
    }

    /// Field path the container belongs to
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of container layers between the field value and this container
    pub fn level(&self) -> usize {
        self.level
    }

    /// Type every value placed in this container must have
    pub fn resolved_type(&self) -> SchemaResult<FieldType> {
        Ok(self.schema.field_type(&self.path)?.unwrap_levels(self.level))
    }

    /// Checks a value entering this container.
    pub(crate) fn validate(&self, value: Value) -> SchemaResult<Validated> {
        if value.is_null() {
            return Err(SchemaError::NullValue(self.path.clone()));
        }
        let resolved = self.resolved_type()?;
        check(&self.path, &self.schema, &resolved, self.level + 1, value)
    }
}

/// A value that has passed validation.
///
/// Lists and dicts are held as validating containers so that later
/// mutations are checked too.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    Value(Value),
    List(ValidatingList),
    Dict(ValidatingDict),
}

impl Validated {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Validated::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ValidatingList> {
        match self {
            Validated::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&ValidatingDict> {
        match self {
            Validated::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Plain value with containers unwrapped recursively
    pub fn to_value(&self) -> Value {
        match self {
            Validated::Value(value) => value.clone(),
            Validated::List(list) => Value::List(list.to_values()),
            Validated::Dict(dict) => Value::Dict(dict.to_values()),
        }
    }
}

/// Checks a value assigned directly to the field at `path`.
pub(crate) fn validate_field(path: &str, schema: &SchemaHandle, value: Value) -> SchemaResult<Validated> {
    if value.is_null() {
        return Err(SchemaError::NullValue(path.to_string()));
    }
    let declared = schema.field_type(path)?;
    check(path, schema, &declared, 0, value)
}

fn check(
    path: &str,
    schema: &SchemaHandle,
    expected: &FieldType,
    child_level: usize,
    value: Value,
) -> SchemaResult<Validated> {
    match expected {
        FieldType::List(_) => match value {
            Value::List(items) => {
                let mut list =
                    ValidatingList::construct(Binding::new(path, schema.clone(), child_level));
                list.extend(items)?;
                Ok(Validated::List(list))
            }
            other => Err(SchemaError::type_mismatch(
                path,
                expected.type_name(),
                other.kind_name(),
            )),
        },
        FieldType::Dict(_) => match value {
            Value::Dict(entries) => {
                let mut dict =
                    ValidatingDict::construct(Binding::new(path, schema.clone(), child_level));
                dict.update(entries)?;
                Ok(Validated::Dict(dict))
            }
            other => Err(SchemaError::type_mismatch(
                path,
                expected.type_name(),
                other.kind_name(),
            )),
        },
        _ if value.is_instance(expected) => Ok(Validated::Value(value)),
        _ => Err(SchemaError::type_mismatch(
            path,
            expected.type_name(),
            value.kind_name(),
        )),
    }
}

/// Unwraps a map of validated values.
pub(crate) fn to_values(entries: &BTreeMap<String, Validated>) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.clone(), value.to_value()))
        .collect()
}
