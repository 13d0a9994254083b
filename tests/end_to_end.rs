//! End-to-End Dataset Tests
//!
//! Full round trips through a dataset: create, fill a root document,
//! save it, commit, reload by name and read the document back. Nested
//! documents land in their own collection and are checked server-side by
//! that collection's validator.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use aeroschema::reference::{Connection, SchemaReference};
use aeroschema::schema::{
    ClassRegistry, Document, DocumentClass, FieldType, SchemaError, Value,
};
use aeroschema::store::{IndexSpec, LocalStore, Session, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    conn: Connection,
    store: LocalStore,
    sample: DocumentClass,
    tag: DocumentClass,
}

fn setup() -> Fixture {
    let tag = DocumentClass::builder("TagDoc")
        .field("name", FieldType::string())
        .field("confidence", FieldType::float())
        .index(IndexSpec::ascending("name"))
        .build();
    let sample = DocumentClass::builder("Sample")
        .field("label", FieldType::string())
        .field("tags", FieldType::list_of(FieldType::document(&tag)))
        .field("captured_at", FieldType::datetime())
        .build();

    let store = LocalStore::in_memory();
    let conn = Connection::new(Arc::new(store.clone()), ClassRegistry::new().with(&sample));
    Fixture {
        conn,
        store,
        sample,
        tag,
    }
}

fn tag(class: &DocumentClass, name: &str, confidence: f64) -> Value {
    Value::Document(
        Document::new(class)
            .with("name", name)
            .with("confidence", confidence),
    )
}

// =============================================================================
// Scenario Tests
// =============================================================================

/// Create, fill, commit, reload and read back one sample.
#[test]
fn test_dataset_round_trip() {
    let fixture = setup();
    let mut reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();

    // Root and tags each get a backing collection
    let collections = reference.collections().unwrap();
    assert_eq!(
        collections.keys().cloned().collect::<Vec<_>>(),
        vec!["".to_string(), "tags".to_string()]
    );
    for path in ["", "label", "tags"] {
        assert!(reference.field(path).is_some(), "missing path {:?}", path);
    }

    let mut record = reference.new_record().unwrap();
    record.set("label", "cat").unwrap();
    record
        .set("captured_at", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        .unwrap();
    record
        .set("tags", Value::List(vec![tag(&fixture.tag, "animal", 0.5)]))
        .unwrap();

    let tags = record.list_mut("tags").unwrap();
    let err = tags.push("not a tag").unwrap_err();
    assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    tags.push(tag(&fixture.tag, "pet", 0.75)).unwrap();

    reference.save_record(&record).unwrap();
    reference.commit().unwrap();

    let loaded = SchemaReference::from_db(&fixture.conn, "ds1").unwrap();
    let restored = loaded.load_record(record.id()).unwrap().unwrap();
    assert_eq!(restored.to_values(), record.to_values());

    let names: Vec<Value> = restored
        .get("tags")
        .and_then(|t| t.as_list())
        .unwrap()
        .iter()
        .filter_map(|t| match t.to_value() {
            Value::Document(doc) => doc.get("name").cloned(),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec![Value::from("animal"), Value::from("pet")]);
}

/// Nested documents are stored in the collection of their path.
#[test]
fn test_nested_documents_stored_separately() {
    let fixture = setup();
    let reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();

    let mut record = reference.new_record().unwrap();
    record
        .set(
            "tags",
            Value::List(vec![tag(&fixture.tag, "a", 0.1), tag(&fixture.tag, "b", 0.2)]),
        )
        .unwrap();
    reference.save_record(&record).unwrap();

    let collections = reference.collections().unwrap();
    let stored_tags = fixture.store.find_all(&collections["tags"]).unwrap();
    assert_eq!(stored_tags.len(), 2);

    let root = fixture.store.find_all(&collections[""]).unwrap();
    assert_eq!(root.len(), 1);
    assert!(root[0]["tags"][0].get("$oid").is_some());
}

/// Saving the same record twice replaces it.
#[test]
fn test_save_record_is_upsert() {
    let fixture = setup();
    let reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();

    let mut record = reference.new_record().unwrap();
    record.set("label", "cat").unwrap();
    reference.save_record(&record).unwrap();
    record.set("label", "dog").unwrap();
    reference.save_record(&record).unwrap();

    let records = reference.load_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("label").and_then(|v| v.as_value()),
        Some(&Value::from("dog"))
    );
}

/// A field added to the live schema can be filled and stored after commit.
#[test]
fn test_added_field_round_trip() {
    let fixture = setup();
    let mut reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();

    reference.add_field("score", FieldType::int()).unwrap();
    assert!(reference.expanded().unwrap());
    reference.commit().unwrap();
    assert!(!reference.expanded().unwrap());

    let mut record = reference.new_record().unwrap();
    record.set("score", 7).unwrap();
    reference.save_record(&record).unwrap();

    let loaded = SchemaReference::from_db_virtual(&fixture.conn, "ds1").unwrap();
    let restored = loaded.load_record(record.id()).unwrap().unwrap();
    assert_eq!(
        restored.get("score").and_then(|v| v.as_value()),
        Some(&Value::Int(7))
    );
}

/// Records saved before a field was removed still load, without it.
#[test]
fn test_records_load_after_field_removed() {
    let fixture = setup();
    let mut reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();
    reference.add_field("note", FieldType::string()).unwrap();
    reference.commit().unwrap();

    let mut record = reference.new_record().unwrap();
    record.set("label", "cat").unwrap();
    record.set("note", "remove me").unwrap();
    reference.save_record(&record).unwrap();

    reference.remove_field("note").unwrap();
    reference.commit().unwrap();

    let records = reference.load_records().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].get("note").is_none());
    assert_eq!(
        records[0].get("label").and_then(|v| v.as_value()),
        Some(&Value::from("cat"))
    );

    // Saving again writes the record without the removed field
    reference.save_record(&records[0]).unwrap();
    let root = fixture.store.find_all(&reference.collections().unwrap()[""]).unwrap();
    assert!(root[0].get("note").is_none());
}

// =============================================================================
// Server-Side Validation Tests
// =============================================================================

/// A nested document carrying an undeclared field is rejected by the
/// store, and nothing of the record is written.
#[test]
fn test_store_rejects_nested_document_with_extra_field() {
    let fixture = setup();
    let reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();

    let bogus = Document::new(&fixture.tag)
        .with("name", "x")
        .with("unexpected", 1);
    let mut record = reference.new_record().unwrap();
    record.set("label", "cat").unwrap();
    record.set("tags", Value::List(vec![Value::Document(bogus)])).unwrap();

    let err = reference.save_record(&record).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::Store(StoreError::ValidationFailed { .. })
    ));
    assert!(reference.load_record(record.id()).unwrap().is_none());
}

/// Unknown record ids load as `None`.
#[test]
fn test_missing_record() {
    let fixture = setup();
    let reference =
        SchemaReference::create(&fixture.conn, "ds1", &fixture.sample, None, false).unwrap();
    assert!(reference
        .load_record(uuid::Uuid::new_v4())
        .unwrap()
        .is_none());
}
