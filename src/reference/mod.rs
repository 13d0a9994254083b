//! Schema references for aeroschema
//!
//! A [`SchemaReference`] owns one dataset's definition, live schema,
//! validators and collection map, and implements the create, load, commit
//! and delete lifecycle. Create, commit and delete each run in exactly one
//! store transaction; failures leave persisted state untouched.

mod connection;
mod definition;
mod merge;
mod provision;
mod records;
#[allow(clippy::module_inception)]
mod reference;

pub use connection::{Connection, Migrator, NoopMigrator, Settings, DEFAULT_DEFINITIONS_COLLECTION};
pub use definition::{DatasetDefinition, DatasetKey, FieldDefinition, MediaType};
pub use merge::SchemaDelta;
pub use provision::{provision, Provisioned};
pub use records::Record;
pub use reference::{ReferenceState, SchemaReference};
