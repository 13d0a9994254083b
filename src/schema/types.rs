//! Live field types
//!
//! Supported shapes:
//! - scalar: any, bool, int, float, string, datetime
//! - list: homogeneous list with element type
//! - dict: string-keyed mapping with value type
//! - tuple: fixed-length ordered types
//! - document: reference to a document stored in its own backing collection

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::document::DocumentClass;
use super::errors::{SchemaError, SchemaResult};

/// Scalar leaf kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// Unresolved or unconstrained type
    Any,
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// UTF-8 string
    String,
    /// UTC timestamp
    Datetime,
}

impl ScalarKind {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Any => "any",
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Datetime => "datetime",
        }
    }
}

/// Live type of a field.
///
/// Type parameters that are not given map to `any`, so every container
/// carries a concrete element type once constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Scalar(ScalarKind),
    List(Box<FieldType>),
    Dict(Box<FieldType>),
    Tuple(Vec<FieldType>),
    Document(DocumentClass),
}

impl FieldType {
    pub fn any() -> Self {
        FieldType::Scalar(ScalarKind::Any)
    }

    pub fn bool() -> Self {
        FieldType::Scalar(ScalarKind::Bool)
    }

    pub fn int() -> Self {
        FieldType::Scalar(ScalarKind::Int)
    }

    pub fn float() -> Self {
        FieldType::Scalar(ScalarKind::Float)
    }

    pub fn string() -> Self {
        FieldType::Scalar(ScalarKind::String)
    }

    pub fn datetime() -> Self {
        FieldType::Scalar(ScalarKind::Datetime)
    }

    /// Unparameterized list (elements of any type)
    pub fn list() -> Self {
        FieldType::List(Box::new(FieldType::any()))
    }

    pub fn list_of(element: FieldType) -> Self {
        FieldType::List(Box::new(element))
    }

    /// Unparameterized dict (values of any type)
    pub fn dict() -> Self {
        FieldType::Dict(Box::new(FieldType::any()))
    }

    pub fn dict_of(value: FieldType) -> Self {
        FieldType::Dict(Box::new(value))
    }

    pub fn tuple(items: Vec<FieldType>) -> Self {
        FieldType::Tuple(items)
    }

    pub fn document(class: &DocumentClass) -> Self {
        FieldType::Document(class.clone())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldType::List(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, FieldType::Dict(_))
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Scalar(kind) => kind.type_name().to_string(),
            FieldType::List(element) => format!("list<{}>", element.type_name()),
            FieldType::Dict(value) => format!("dict<{}>", value.type_name()),
            FieldType::Tuple(items) => {
                let names: Vec<String> = items.iter().map(|t| t.type_name()).collect();
                format!("tuple<{}>", names.join(", "))
            }
            FieldType::Document(class) => format!("document<{}>", class.name()),
        }
    }

    /// Returns the type held by one layer of this container.
    ///
    /// List yields its element type, dict its value type. Anything else has
    /// no parameter to unwrap and yields `any`.
    pub fn element(&self) -> FieldType {
        match self {
            FieldType::List(element) => (**element).clone(),
            FieldType::Dict(value) => (**value).clone(),
            _ => FieldType::any(),
        }
    }

    /// Unwraps one container layer, then `level` more.
    pub fn unwrap_levels(&self, level: usize) -> FieldType {
        let mut resolved = self.element();
        for _ in 0..level {
            resolved = resolved.element();
        }
        resolved
    }

    /// Returns the document class nested inside a list/dict chain.
    ///
    /// Stops at the first tuple or scalar.
    pub fn document_class(&self) -> Option<&DocumentClass> {
        let mut check = self;
        loop {
            match check {
                FieldType::List(inner) | FieldType::Dict(inner) => check = inner.as_ref(),
                FieldType::Document(class) => return Some(class),
                FieldType::Tuple(_) | FieldType::Scalar(_) => return None,
            }
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A named slot in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: Option<FieldType>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type),
        }
    }

    /// A field whose type has not been declared yet
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
        }
    }

    pub fn field_type(&self) -> Option<&FieldType> {
        self.field_type.as_ref()
    }

    /// Returns the declared type or fails with `MissingFieldType`
    pub fn require_type(&self, path: &str) -> SchemaResult<&FieldType> {
        self.field_type
            .as_ref()
            .ok_or_else(|| SchemaError::MissingFieldType(path.to_string()))
    }
}

/// Mapping from field path to field. The root document occupies `""`.
pub type Schema = BTreeMap<String, Field>;

/// Joins a field name onto a path prefix.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Returns the last segment of a path.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Shared handle on a reference's live schema.
///
/// Validating containers hold a clone so that every mutation is checked
/// against the schema the reference currently holds.
#[derive(Debug, Clone, Default)]
pub struct SchemaHandle(Arc<RwLock<Schema>>);

impl SchemaHandle {
    pub fn new(schema: Schema) -> Self {
        Self(Arc::new(RwLock::new(schema)))
    }

    /// Returns a copy of the current schema
    pub fn snapshot(&self) -> Schema {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the schema wholesale
    pub fn replace(&self, schema: Schema) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = schema;
    }

    /// Applies an edit to the schema in place
    pub fn update<T>(&self, edit: impl FnOnce(&mut Schema) -> T) -> T {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut guard)
    }

    /// Returns the field at `path`
    pub fn field(&self, path: &str) -> Option<Field> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Returns the declared type at `path`
    pub fn field_type(&self, path: &str) -> SchemaResult<FieldType> {
        let guard = self.0.read().unwrap_or_else(PoisonError::into_inner);
        let field = guard
            .get(path)
            .ok_or_else(|| SchemaError::UnknownField(path.to_string()))?;
        field.require_type(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
