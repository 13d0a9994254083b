//! Collection and index provisioning
//!
//! Makes the backing store match a target schema: missing collections are
//! created after one batched existence check, class indexes are ensured, and
//! validators are installed last. Running it twice with the same schema and
//! the collection names returned by the first run writes nothing.

use crate::observability::{Event, Logger};
use crate::schema::{Schema, SchemaResult};
use crate::store::Session;
use crate::validator::{
    collection_paths, commit_validator, to_field_definitions, to_validators, Collections,
    Validators,
};

use super::definition::FieldDefinition;

/// New source of truth for a reference after provisioning
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub collections: Collections,
    pub field_definitions: Vec<FieldDefinition>,
    pub validators: Validators,
}

/// Provisions every backing collection `schema` needs.
///
/// `known` maps paths to collection names allocated earlier; those names are
/// reused.
pub fn provision(session: &dyn Session, schema: &Schema, known: &Collections) -> SchemaResult<Provisioned> {
    let field_definitions = to_field_definitions(schema, known)?;
    let collections = collection_paths(&field_definitions);
    let validators = to_validators(&collections, schema)?;

    let names: Vec<String> = collections.values().cloned().collect();
    let existing = session.list_collections(&names)?;

    for (path, name) in &collections {
        if !existing.contains(name) {
            session.create_collection(name)?;
            Logger::info(
                Event::CollectionCreated.as_str(),
                &[("path", path.as_str()), ("collection", name.as_str())],
            );
        }

        let class = schema
            .get(path)
            .and_then(|field| field.field_type())
            .and_then(|field_type| field_type.document_class());

        for index in class.map(|c| c.indexes()).unwrap_or_default() {
            if session.create_index(name, index)? {
                let index_name = index.name();
                Logger::info(
                    Event::IndexCreated.as_str(),
                    &[("collection", name.as_str()), ("index", index_name.as_str())],
                );
            }
        }
    }

    for (name, spec) in &validators {
        commit_validator(session, name, spec)?;
    }

    Ok(Provisioned {
        collections,
        field_definitions,
        validators,
    })
}
