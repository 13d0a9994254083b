//! Runtime values
//!
//! Values are untyped until they cross a validating container or a record,
//! where they are checked against the live schema.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::document::Document;
use super::types::{FieldType, ScalarKind};

/// A dynamically typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Datetime(DateTime<Utc>),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Tuple(Vec<Value>),
    Document(Document),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the runtime kind name for error messages
    pub fn kind_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(f) if !f.is_finite() => "non-finite float".into(),
            Value::Float(_) => "float".into(),
            Value::String(_) => "string".into(),
            Value::Datetime(_) => "datetime".into(),
            Value::List(_) => "list".into(),
            Value::Dict(_) => "dict".into(),
            Value::Tuple(_) => "tuple".into(),
            Value::Document(doc) => format!("document<{}>", doc.class_name()),
        }
    }

    /// Returns true if this value is an instance of `field_type`.
    ///
    /// Nulls and non-finite floats are never instances. Ints are accepted
    /// where floats are declared; no other coercion happens.
    pub fn is_instance(&self, field_type: &FieldType) -> bool {
        if self.is_null() || matches!(self, Value::Float(f) if !f.is_finite()) {
            return false;
        }

        match field_type {
            FieldType::Scalar(kind) => match (kind, self) {
                (ScalarKind::Any, value) => value.is_storable(),
                (ScalarKind::Bool, Value::Bool(_)) => true,
                (ScalarKind::Int, Value::Int(_)) => true,
                (ScalarKind::Float, Value::Float(_) | Value::Int(_)) => true,
                (ScalarKind::String, Value::String(_)) => true,
                (ScalarKind::Datetime, Value::Datetime(_)) => true,
                _ => false,
            },
            FieldType::List(element) => match self {
                Value::List(items) => items.iter().all(|item| item.is_instance(element)),
                _ => false,
            },
            FieldType::Dict(value_type) => match self {
                Value::Dict(entries) => entries.values().all(|v| v.is_instance(value_type)),
                _ => false,
            },
            FieldType::Tuple(types) => match self {
                Value::Tuple(items) | Value::List(items) => {
                    items.len() == types.len()
                        && items.iter().zip(types).all(|(item, ty)| item.is_instance(ty))
                }
                _ => false,
            },
            FieldType::Document(class) => match self {
                Value::Document(doc) => doc.class_name() == class.name() && self.is_storable(),
                _ => false,
            },
        }
    }

    /// False if a float anywhere inside is NaN or infinite, which JSON
    /// cannot carry.
    pub fn is_storable(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::List(items) | Value::Tuple(items) => items.iter().all(Value::is_storable),
            Value::Dict(entries) => entries.values().all(Value::is_storable),
            Value::Document(doc) => doc.fields().values().all(Value::is_storable),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Datetime(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Dict(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DocumentClass;

    #[test]
    fn test_null_is_never_an_instance() {
        assert!(!Value::Null.is_instance(&FieldType::any()));
        assert!(!Value::Null.is_instance(&FieldType::string()));
    }

    #[test]
    fn test_scalar_instances() {
        assert!(Value::from("a").is_instance(&FieldType::string()));
        assert!(!Value::from("a").is_instance(&FieldType::int()));
        assert!(Value::from(3).is_instance(&FieldType::float()));
        assert!(!Value::from(3.5).is_instance(&FieldType::int()));
        assert!(Value::from(true).is_instance(&FieldType::any()));
    }

    #[test]
    fn test_nested_instances() {
        let ty = FieldType::list_of(FieldType::int());
        assert!(Value::from(vec![Value::from(1), Value::from(2)]).is_instance(&ty));
        assert!(!Value::from(vec![Value::from(1), Value::Null]).is_instance(&ty));

        let tuple = FieldType::tuple(vec![FieldType::int(), FieldType::string()]);
        assert!(Value::Tuple(vec![Value::from(1), Value::from("a")]).is_instance(&tuple));
        assert!(!Value::Tuple(vec![Value::from(1)]).is_instance(&tuple));
    }

    #[test]
    fn test_document_instances_match_by_class() {
        let tag = DocumentClass::builder("TagDoc").build();
        let other = DocumentClass::builder("Other").build();

        let value = Value::from(tag.new_document());
        assert!(value.is_instance(&FieldType::document(&tag)));
        assert!(!value.is_instance(&FieldType::document(&other)));
        assert_eq!(value.kind_name(), "document<TagDoc>");
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let value = Value::Float(f);
            assert!(!value.is_instance(&FieldType::float()));
            assert!(!value.is_instance(&FieldType::any()));
            assert_eq!(value.kind_name(), "non-finite float");
        }

        let nested = Value::List(vec![Value::from(1.0), Value::Float(f64::NAN)]);
        assert!(!nested.is_instance(&FieldType::any()));
        assert!(!nested.is_instance(&FieldType::list_of(FieldType::float())));

        let tag = DocumentClass::builder("TagDoc")
            .field("score", FieldType::float())
            .build();
        let doc = Value::from(tag.new_document().with("score", f64::INFINITY));
        assert!(!doc.is_instance(&FieldType::document(&tag)));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
