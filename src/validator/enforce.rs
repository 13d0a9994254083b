//! Server-side document validation
//!
//! Validation semantics:
//! - Titled objects admit only declared properties (plus `_id`)
//! - Declared properties may be absent
//! - Field types exactly match the declared storage type
//! - `long` rejects floats; `double` accepts integers
//! - Null values are rejected wherever a type is declared
//!
//! Documents are the JSON encoding written to the store: dates are
//! `{"$date": "<rfc3339>"}` and document references are `{"$oid": "<id>"}`.

use std::fmt;

use chrono::DateTime;
use serde_json::{Map, Value};

use super::property::{BsonType, Items, SchemaProperty};

/// Where and why a document failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self::new(field, "no such field", "field present")
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(field, expected, actual)
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, "non-null value", "null")
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Checks documents against one collection's validator tree.
///
/// The validator does not mutate documents and is deterministic.
pub struct DocumentValidator<'a> {
    spec: &'a SchemaProperty,
}

impl<'a> DocumentValidator<'a> {
    pub fn new(spec: &'a SchemaProperty) -> Self {
        Self { spec }
    }

    /// Validates a whole document.
    pub fn validate_document(&self, document: &Value) -> Result<(), ValidationDetails> {
        validate_value(document, self.spec, "$root")
    }
}

fn validate_value(
    value: &Value,
    spec: &SchemaProperty,
    field_path: &str,
) -> Result<(), ValidationDetails> {
    let bson_type = match spec.bson_type {
        Some(bson_type) => bson_type,
        None => return Ok(()),
    };

    if value.is_null() {
        return Err(ValidationDetails::null_value(field_path));
    }

    match bson_type {
        BsonType::String => {
            if !value.is_string() {
                return Err(type_error(field_path, bson_type, value));
            }
        }
        BsonType::Long => {
            if !value.is_i64() && !value.is_u64() {
                return Err(type_error(field_path, bson_type, value));
            }
        }
        BsonType::Double => {
            if !value.is_number() {
                return Err(type_error(field_path, bson_type, value));
            }
        }
        BsonType::Bool => {
            if !value.is_boolean() {
                return Err(type_error(field_path, bson_type, value));
            }
        }
        BsonType::Date => {
            let valid = extended(value, "$date")
                .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(type_error(field_path, bson_type, value));
            }
        }
        BsonType::ObjectId => {
            if extended(value, "$oid").is_none() {
                return Err(type_error(field_path, bson_type, value));
            }
        }
        BsonType::Object => {
            let obj = value
                .as_object()
                .ok_or_else(|| type_error(field_path, bson_type, value))?;
            validate_object(obj, spec, field_path)?;
        }
        BsonType::Array => {
            let arr = value
                .as_array()
                .ok_or_else(|| type_error(field_path, bson_type, value))?;
            validate_array(arr, spec, field_path)?;
        }
    }

    Ok(())
}

fn validate_object(
    obj: &Map<String, Value>,
    spec: &SchemaProperty,
    path_prefix: &str,
) -> Result<(), ValidationDetails> {
    if let Some(value_spec) = &spec.additional_properties {
        for (key, value) in obj {
            validate_value(value, value_spec, &make_path(path_prefix, key))?;
        }
        return Ok(());
    }

    // Titled objects are closed: no undeclared fields
    if spec.title.is_some() {
        for key in obj.keys() {
            if key != "_id" && !spec.properties.contains_key(key) {
                return Err(ValidationDetails::extra_field(make_path(path_prefix, key)));
            }
        }
    }

    for (field_name, field_spec) in &spec.properties {
        if let Some(value) = obj.get(field_name) {
            validate_value(value, field_spec, &make_path(path_prefix, field_name))?;
        }
    }

    Ok(())
}

fn validate_array(
    arr: &[Value],
    spec: &SchemaProperty,
    field_path: &str,
) -> Result<(), ValidationDetails> {
    if let Some(min) = spec.min_items {
        if arr.len() < min {
            return Err(ValidationDetails::type_mismatch(
                field_path,
                format!("at least {} items", min),
                format!("{} items", arr.len()),
            ));
        }
    }
    if let Some(max) = spec.max_items {
        if arr.len() > max {
            return Err(ValidationDetails::type_mismatch(
                field_path,
                format!("at most {} items", max),
                format!("{} items", arr.len()),
            ));
        }
    }

    match &spec.items {
        Some(Items::Single(element)) => {
            for (i, elem) in arr.iter().enumerate() {
                validate_value(elem, element, &format!("{}[{}]", field_path, i))?;
            }
        }
        Some(Items::Tuple(items)) => {
            for (i, (elem, item)) in arr.iter().zip(items).enumerate() {
                validate_value(elem, item, &format!("{}[{}]", field_path, i))?;
            }
        }
        None => {}
    }

    Ok(())
}

/// Returns the string payload of an extended-JSON wrapper like `{"$oid": ".."}`.
fn extended<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(key)?.as_str()
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "long"
            } else {
                "double"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Creates a field path from prefix and field name.
fn make_path(prefix: &str, field: &str) -> String {
    if prefix == "$root" {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn type_error(field_path: &str, expected: BsonType, actual: &Value) -> ValidationDetails {
    ValidationDetails::type_mismatch(field_path, expected.as_str(), json_type_name(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_spec() -> SchemaProperty {
        serde_json::from_value(json!({
            "bsonType": "object",
            "title": "Sample",
            "properties": {
                "label": {"bsonType": "string"},
                "count": {"bsonType": "long"},
                "score": {"bsonType": "double"},
                "created": {"bsonType": "date"},
                "tags": {"bsonType": "array", "items": {"bsonType": "objectId", "title": "TagDoc"}},
                "meta": {"bsonType": "object", "additionalProperties": {"bsonType": "long"}},
                "point": {
                    "bsonType": "array",
                    "items": [{"bsonType": "double"}, {"bsonType": "double"}],
                    "minItems": 2,
                    "maxItems": 2
                },
                "anything": {}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_document_passes() {
        let spec = sample_spec();
        let doc = json!({
            "_id": "abc",
            "label": "cat",
            "count": 3,
            "score": 1,
            "created": {"$date": "2024-01-01T00:00:00Z"},
            "tags": [{"$oid": "t1"}, {"$oid": "t2"}],
            "meta": {"a": 1},
            "point": [0.5, 1.5],
            "anything": null
        });

        assert!(DocumentValidator::new(&spec).validate_document(&doc).is_ok());
    }

    #[test]
    fn test_missing_fields_are_allowed() {
        let spec = sample_spec();
        assert!(DocumentValidator::new(&spec)
            .validate_document(&json!({"_id": "abc"}))
            .is_ok());
    }

    #[test]
    fn test_extra_field_fails() {
        let spec = sample_spec();
        let err = DocumentValidator::new(&spec)
            .validate_document(&json!({"_id": "abc", "unknown_field": 1}))
            .unwrap_err();
        assert_eq!(err.field, "unknown_field");
    }

    #[test]
    fn test_type_mismatch_fails() {
        let spec = sample_spec();
        let err = DocumentValidator::new(&spec)
            .validate_document(&json!({"label": 123}))
            .unwrap_err();
        assert_eq!(err.field, "label");
        assert_eq!(err.expected, "string");
        assert_eq!(err.actual, "long");
    }

    #[test]
    fn test_long_rejects_float() {
        let spec = sample_spec();
        assert!(DocumentValidator::new(&spec)
            .validate_document(&json!({"count": 1.5}))
            .is_err());
    }

    #[test]
    fn test_null_rejected() {
        let spec = sample_spec();
        let err = DocumentValidator::new(&spec)
            .validate_document(&json!({"label": null}))
            .unwrap_err();
        assert!(err.actual.contains("null"));
    }

    #[test]
    fn test_array_element_validation() {
        let spec = sample_spec();
        let err = DocumentValidator::new(&spec)
            .validate_document(&json!({"tags": [{"$oid": "t1"}, "t2"]}))
            .unwrap_err();
        assert_eq!(err.field, "tags[1]");
    }

    #[test]
    fn test_tuple_length_enforced() {
        let spec = sample_spec();
        assert!(DocumentValidator::new(&spec)
            .validate_document(&json!({"point": [1.0]}))
            .is_err());
        assert!(DocumentValidator::new(&spec)
            .validate_document(&json!({"point": [1.0, 2.0, 3.0]}))
            .is_err());
    }

    #[test]
    fn test_mapping_values_validated() {
        let spec = sample_spec();
        let err = DocumentValidator::new(&spec)
            .validate_document(&json!({"meta": {"a": 1, "b": "x"}}))
            .unwrap_err();
        assert_eq!(err.field, "meta.b");
    }

    #[test]
    fn test_bad_date_rejected() {
        let spec = sample_spec();
        assert!(DocumentValidator::new(&spec)
            .validate_document(&json!({"created": {"$date": "yesterday"}}))
            .is_err());
        assert!(DocumentValidator::new(&spec)
            .validate_document(&json!({"created": "2024-01-01T00:00:00Z"}))
            .is_err());
    }
}
