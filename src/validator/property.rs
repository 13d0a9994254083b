//! Validator property trees
//!
//! A [`SchemaProperty`] is one node of a `$jsonSchema`-style validator
//! document. Each backing collection carries one tree whose top-level node
//! is a titled object; every field owned by that collection appears as one
//! of its properties.
//!
//! Mapping from descriptors:
//! - any -> `{}`
//! - bool/int/float/string/datetime -> `bool`/`long`/`double`/`string`/`date`
//! - list -> `array` with single `items`
//! - tuple -> `array` with positional `items` and fixed length
//! - dict -> `object` with `additionalProperties`
//! - document -> `objectId` titled with the class name

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{
    get_type_definition, FieldType, ScalarKind, SchemaError, SchemaResult, TypeDescriptor,
};

/// Storage-level type names understood by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    Object,
    Array,
    String,
    Long,
    Double,
    Bool,
    Date,
    ObjectId,
}

impl BsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::String => "string",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::ObjectId => "objectId",
        }
    }
}

/// Element constraint of an array property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    /// Elements are checked positionally
    Tuple(Vec<SchemaProperty>),
    /// Every element has the same shape
    Single(Box<SchemaProperty>),
}

/// One node of a validator tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bson_type: Option<BsonType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaProperty>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SchemaProperty>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl SchemaProperty {
    /// Unconstrained property
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_type(bson_type: BsonType) -> Self {
        Self {
            bson_type: Some(bson_type),
            ..Self::default()
        }
    }

    /// Top-level node of a backing collection's validator
    pub fn collection(class_name: impl Into<String>) -> Self {
        Self {
            bson_type: Some(BsonType::Object),
            title: Some(class_name.into()),
            ..Self::default()
        }
    }

    /// Builds the property for a live field type
    pub fn from_field_type(field_type: &FieldType) -> Self {
        Self::from_descriptor(&get_type_definition(field_type))
    }

    /// Builds the property for a persisted descriptor
    pub fn from_descriptor(descriptor: &TypeDescriptor) -> Self {
        match descriptor {
            TypeDescriptor::Scalar { scalar } => match scalar {
                ScalarKind::Any => Self::any(),
                ScalarKind::Bool => Self::of_type(BsonType::Bool),
                ScalarKind::Int => Self::of_type(BsonType::Long),
                ScalarKind::Float => Self::of_type(BsonType::Double),
                ScalarKind::String => Self::of_type(BsonType::String),
                ScalarKind::Datetime => Self::of_type(BsonType::Date),
            },
            TypeDescriptor::List { element } => Self {
                items: Some(Items::Single(Box::new(Self::from_descriptor(element)))),
                ..Self::of_type(BsonType::Array)
            },
            TypeDescriptor::Tuple { items } => Self {
                items: Some(Items::Tuple(items.iter().map(Self::from_descriptor).collect())),
                min_items: Some(items.len()),
                max_items: Some(items.len()),
                ..Self::of_type(BsonType::Array)
            },
            TypeDescriptor::Dict { value } => Self {
                additional_properties: Some(Box::new(Self::from_descriptor(value))),
                ..Self::of_type(BsonType::Object)
            },
            TypeDescriptor::Document { class } => Self {
                title: Some(class.clone()),
                ..Self::of_type(BsonType::ObjectId)
            },
        }
    }

    /// Rebuilds the descriptor a field property was generated from.
    ///
    /// Fails with `UnresolvableDescriptor` for shapes no descriptor maps to,
    /// such as an untitled `objectId` or an object without
    /// `additionalProperties`.
    pub fn to_descriptor(&self, path: &str) -> SchemaResult<TypeDescriptor> {
        let bson_type = match self.bson_type {
            Some(bson_type) => bson_type,
            None => return Ok(TypeDescriptor::any()),
        };

        Ok(match bson_type {
            BsonType::Bool => TypeDescriptor::scalar(ScalarKind::Bool),
            BsonType::Long => TypeDescriptor::scalar(ScalarKind::Int),
            BsonType::Double => TypeDescriptor::scalar(ScalarKind::Float),
            BsonType::String => TypeDescriptor::scalar(ScalarKind::String),
            BsonType::Date => TypeDescriptor::scalar(ScalarKind::Datetime),
            BsonType::ObjectId => match &self.title {
                Some(class) => TypeDescriptor::Document {
                    class: class.clone(),
                },
                None => {
                    return Err(SchemaError::unresolvable(
                        path,
                        "objectId property has no document class title",
                    ))
                }
            },
            BsonType::Array => match &self.items {
                Some(Items::Single(element)) => TypeDescriptor::List {
                    element: Box::new(element.to_descriptor(path)?),
                },
                Some(Items::Tuple(items)) => TypeDescriptor::Tuple {
                    items: items
                        .iter()
                        .map(|item| item.to_descriptor(path))
                        .collect::<SchemaResult<Vec<_>>>()?,
                },
                None => TypeDescriptor::List {
                    element: Box::new(TypeDescriptor::any()),
                },
            },
            BsonType::Object => match &self.additional_properties {
                Some(value) => TypeDescriptor::Dict {
                    value: Box::new(value.to_descriptor(path)?),
                },
                None => {
                    return Err(SchemaError::unresolvable(
                        path,
                        "object property is neither a mapping nor a document reference",
                    ))
                }
            },
        })
    }

    /// Wraps the tree into the validator document stored on a collection
    pub fn to_validator_document(&self) -> serde_json::Value {
        serde_json::json!({ "$jsonSchema": self })
    }

    /// Extracts the tree from a stored validator document
    pub fn from_validator_document(document: &serde_json::Value) -> Option<Self> {
        document
            .get("$jsonSchema")
            .and_then(|spec| serde_json::from_value(spec.clone()).ok())
    }
}
