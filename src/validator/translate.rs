//! Translation between schemas, field definitions and validators
//!
//! Every document-typed path owns a backing collection. A path belongs to
//! the collection of its longest proper prefix that is itself a collection
//! path; the root `""` owns every path no other collection claims. Each
//! collection's validator lists, as properties, the fields it owns keyed by
//! the path suffix below the owner.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::property::SchemaProperty;
use crate::observability::{Event, Logger};
use crate::reference::FieldDefinition;
use crate::schema::{
    get_type_definition, leaf_name, ClassRegistry, DocumentClass, Field, Schema, SchemaError,
    SchemaResult, TypeDescriptor,
};
use crate::store::{Session, StoreResult};

/// Path -> backing collection name
pub type Collections = BTreeMap<String, String>;

/// Backing collection name -> validator tree
pub type Validators = BTreeMap<String, SchemaProperty>;

/// Allocates a fresh backing collection name for a document class.
///
/// Names look like `tag_doc.3f2a...`; they are unique per allocation.
pub fn allocate_collection_name(class: &DocumentClass) -> String {
    format!("{}.{}", snake_case(class.name()), Uuid::new_v4().simple())
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Builds the persisted field definitions for a schema, sorted by path.
///
/// Document-typed paths reuse the collection name in `known` when one was
/// allocated before and get a fresh one otherwise. Fails with
/// `MissingFieldType` for any field without a type.
pub fn to_field_definitions(schema: &Schema, known: &Collections) -> SchemaResult<Vec<FieldDefinition>> {
    let mut definitions = Vec::with_capacity(schema.len());

    for (path, field) in schema {
        let field_type = field.require_type(path)?;
        let collection = field_type.document_class().map(|class| {
            known
                .get(path)
                .cloned()
                .unwrap_or_else(|| allocate_collection_name(class))
        });

        definitions.push(FieldDefinition {
            path: path.clone(),
            descriptor: get_type_definition(field_type),
            collection,
        });
    }

    definitions.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(definitions)
}

/// Extracts the collection map from field definitions.
pub fn collection_paths(definitions: &[FieldDefinition]) -> Collections {
    definitions
        .iter()
        .filter_map(|def| def.collection.clone().map(|name| (def.path.clone(), name)))
        .collect()
}

/// Returns the collection path that owns `path`.
///
/// The root path has no owner.
pub fn owner_of<'a>(path: &str, collections: &'a Collections) -> Option<&'a str> {
    collections
        .keys()
        .filter(|candidate| {
            candidate.as_str() != path
                && (candidate.is_empty()
                    || (path.len() > candidate.len()
                        && path.starts_with(candidate.as_str())
                        && path.as_bytes()[candidate.len()] == b'.'))
        })
        .max_by_key(|candidate| candidate.len())
        .map(String::as_str)
}

/// Property key of `path` inside its owner's validator.
fn property_key<'p>(path: &'p str, owner: &str) -> &'p str {
    if owner.is_empty() {
        path
    } else {
        &path[owner.len() + 1..]
    }
}

/// Builds one validator tree per backing collection.
pub fn to_validators(collections: &Collections, schema: &Schema) -> SchemaResult<Validators> {
    let mut validators = Validators::new();

    for (path, name) in collections {
        let field = schema
            .get(path)
            .ok_or_else(|| SchemaError::UnknownField(path.clone()))?;
        let class = field.require_type(path)?.document_class().ok_or_else(|| {
            SchemaError::unresolvable(path.as_str(), "collection path is not document-typed")
        })?;
        validators.insert(name.clone(), SchemaProperty::collection(class.name()));
    }

    for (path, field) in schema {
        let owner = match owner_of(path, collections) {
            Some(owner) => owner,
            None => continue,
        };
        let field_type = field.require_type(path)?;

        if let Some(spec) = validators.get_mut(&collections[owner]) {
            spec.properties.insert(
                property_key(path, owner).to_string(),
                SchemaProperty::from_field_type(field_type),
            );
        }
    }

    Ok(validators)
}

/// Rebuilds the live schema from persisted definitions and validators.
///
/// Validators are the source of truth. A definition whose type cannot be
/// found in any validator falls back to its persisted descriptor.
pub fn to_schema(
    definitions: &[FieldDefinition],
    validators: &Validators,
    registry: &ClassRegistry,
) -> SchemaResult<Schema> {
    let collections = collection_paths(definitions);
    let mut schema = Schema::new();

    for def in definitions {
        let descriptor = match validator_descriptor(def, &collections, validators)? {
            Some(descriptor) => descriptor,
            None => {
                Logger::warn(Event::ValidatorFallback.as_str(), &[("path", def.path.as_str())]);
                def.descriptor.clone()
            }
        };

        let field_type = descriptor.to_field_type(&def.path, registry)?;
        schema.insert(def.path.clone(), Field::new(leaf_name(&def.path), field_type));
    }

    Ok(schema)
}

fn validator_descriptor(
    def: &FieldDefinition,
    collections: &Collections,
    validators: &Validators,
) -> SchemaResult<Option<TypeDescriptor>> {
    if let Some(owner) = owner_of(&def.path, collections) {
        let property = validators
            .get(&collections[owner])
            .and_then(|spec| spec.properties.get(property_key(&def.path, owner)));
        return property.map(|p| p.to_descriptor(&def.path)).transpose();
    }

    // Unowned collection paths carry their class in their own validator
    Ok(def
        .collection
        .as_ref()
        .and_then(|name| validators.get(name))
        .and_then(|spec| spec.title.clone())
        .map(|class| TypeDescriptor::Document { class }))
}

/// Installs or replaces a collection's validator.
///
/// Returns false without writing when the installed validator is identical.
pub fn commit_validator(
    session: &dyn Session,
    collection: &str,
    spec: &SchemaProperty,
) -> StoreResult<bool> {
    let document = spec.to_validator_document();

    if session.get_validator(collection)?.as_ref() == Some(&document) {
        Logger::trace(
            Event::ValidatorUnchanged.as_str(),
            &[("collection", collection)],
        );
        return Ok(false);
    }

    session.set_validator(collection, &document)?;
    Logger::info(
        Event::ValidatorInstalled.as_str(),
        &[("collection", collection)],
    );
    Ok(true)
}

/// Reads back the validators installed on the given collections.
///
/// Collections that do not exist or carry no validator are omitted.
pub fn load_validators(session: &dyn Session, collections: &Collections) -> StoreResult<Validators> {
    let names: Vec<String> = collections.values().cloned().collect();
    let existing = session.list_collections(&names)?;

    let mut validators = Validators::new();
    for name in names.into_iter().filter(|n| existing.contains(n)) {
        if let Some(spec) = session
            .get_validator(&name)?
            .as_ref()
            .and_then(SchemaProperty::from_validator_document)
        {
            validators.insert(name, spec);
        }
    }

    Ok(validators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn classes() -> (DocumentClass, DocumentClass) {
        let tag = DocumentClass::builder("TagDoc")
            .field("name", FieldType::string())
            .build();
        let sample = DocumentClass::builder("Sample")
            .field("label", FieldType::string())
            .field("tags", FieldType::list_of(FieldType::document(&tag)))
            .build();
        (sample, tag)
    }

    fn sample_schema() -> Schema {
        let (sample, tag) = classes();
        let mut schema = Schema::new();
        schema.insert("".into(), Field::new("", FieldType::document(&sample)));
        schema.insert("label".into(), Field::new("label", FieldType::string()));
        schema.insert(
            "tags".into(),
            Field::new("tags", FieldType::list_of(FieldType::document(&tag))),
        );
        schema.insert("tags.name".into(), Field::new("name", FieldType::string()));
        schema.insert(
            "meta".into(),
            Field::new("meta", FieldType::dict_of(FieldType::tuple(vec![FieldType::int()]))),
        );
        schema
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("TagDoc"), "tag_doc");
        assert_eq!(snake_case("Sample"), "sample");
        assert_eq!(snake_case("A-b"), "a_b");
    }

    #[test]
    fn test_field_definitions_sorted_with_collections() {
        let defs = to_field_definitions(&sample_schema(), &Collections::new()).unwrap();
        let paths: Vec<&str> = defs.iter().map(|d| d.path.as_str()).collect();

        assert_eq!(paths, vec!["", "label", "meta", "tags", "tags.name"]);
        assert!(defs[0].collection.as_deref().unwrap().starts_with("sample."));
        assert!(defs[3].collection.as_deref().unwrap().starts_with("tag_doc."));
        assert!(defs[1].collection.is_none());
    }

    #[test]
    fn test_known_collection_names_are_reused() {
        let mut known = Collections::new();
        known.insert("tags".into(), "tag_doc.fixed".into());

        let defs = to_field_definitions(&sample_schema(), &known).unwrap();
        assert_eq!(collection_paths(&defs)["tags"], "tag_doc.fixed");
    }

    #[test]
    fn test_missing_field_type_rejected() {
        let mut schema = sample_schema();
        schema.insert("broken".into(), Field::untyped("broken"));

        let err = to_field_definitions(&schema, &Collections::new()).unwrap_err();
        assert_eq!(err.code(), "AERO_SCHEMA_MISSING_FIELD_TYPE");
    }

    #[test]
    fn test_owner_of() {
        let mut collections = Collections::new();
        collections.insert("".into(), "root".into());
        collections.insert("tags".into(), "tags".into());

        assert_eq!(owner_of("", &collections), None);
        assert_eq!(owner_of("tags", &collections), Some(""));
        assert_eq!(owner_of("tags.name", &collections), Some("tags"));
        assert_eq!(owner_of("tagsx", &collections), Some(""));
    }

    #[test]
    fn test_validators_group_by_owner() {
        let schema = sample_schema();
        let defs = to_field_definitions(&schema, &Collections::new()).unwrap();
        let collections = collection_paths(&defs);
        let validators = to_validators(&collections, &schema).unwrap();

        let root = &validators[&collections[""]];
        assert_eq!(root.title.as_deref(), Some("Sample"));
        assert!(root.properties.contains_key("label"));
        assert!(root.properties.contains_key("tags"));
        assert!(!root.properties.contains_key("tags.name"));

        let tags = &validators[&collections["tags"]];
        assert_eq!(tags.title.as_deref(), Some("TagDoc"));
        assert!(tags.properties.contains_key("name"));
    }

    #[test]
    fn test_schema_round_trip() {
        let (sample, _) = classes();
        let registry = ClassRegistry::new().with(&sample);
        let schema = sample_schema();

        let defs = to_field_definitions(&schema, &Collections::new()).unwrap();
        let validators = to_validators(&collection_paths(&defs), &schema).unwrap();
        let rebuilt = to_schema(&defs, &validators, &registry).unwrap();

        assert_eq!(rebuilt, schema);
    }

    #[test]
    fn test_validators_are_source_of_truth() {
        let (sample, _) = classes();
        let registry = ClassRegistry::new().with(&sample);
        let schema = sample_schema();

        let defs = to_field_definitions(&schema, &Collections::new()).unwrap();
        let collections = collection_paths(&defs);
        let mut validators = to_validators(&collections, &schema).unwrap();
        validators
            .get_mut(&collections[""])
            .unwrap()
            .properties
            .insert("label".into(), SchemaProperty::from_field_type(&FieldType::int()));

        let rebuilt = to_schema(&defs, &validators, &registry).unwrap();
        assert_eq!(rebuilt["label"].field_type, Some(FieldType::int()));
    }

    #[test]
    fn test_missing_validator_falls_back_to_definition() {
        let (sample, _) = classes();
        let registry = ClassRegistry::new().with(&sample);
        let schema = sample_schema();

        let defs = to_field_definitions(&schema, &Collections::new()).unwrap();
        let rebuilt = to_schema(&defs, &Validators::new(), &registry).unwrap();
        assert_eq!(rebuilt, schema);
    }
}
