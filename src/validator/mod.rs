//! Schema validator translator for aeroschema
//!
//! Converts field definitions into per-collection validator trees, installs
//! them on the store, reads them back, and enforces them on documents.

mod enforce;
mod property;
mod translate;

pub use enforce::{DocumentValidator, ValidationDetails};
pub use property::{BsonType, Items, SchemaProperty};
pub use translate::{
    allocate_collection_name, collection_paths, commit_validator, load_validators, owner_of,
    to_field_definitions, to_schema, to_validators, Collections, Validators,
};
