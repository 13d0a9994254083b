//! Type descriptor model for aeroschema
//!
//! Live field types, their persisted descriptor trees, document classes and
//! runtime values.
//!
//! # Design Principles
//!
//! - Descriptors are built once at schema-definition time
//! - Document classes are resolved by name, never by reflection
//! - Nulls are never instances of any type
//! - Document-typed leaves are the only types that allocate collections

mod descriptor;
mod document;
mod errors;
mod types;
mod value;

pub use descriptor::{get_type_definition, resolve_document_class, TypeDescriptor};
pub use document::{ClassRegistry, Document, DocumentClass, DocumentClassBuilder};
pub use errors::{SchemaError, SchemaResult};
pub use types::{join_path, leaf_name, Field, FieldType, ScalarKind, Schema, SchemaHandle};
pub use value::Value;
