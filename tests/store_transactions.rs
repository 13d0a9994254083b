//! Store Transaction Tests
//!
//! Tests for the bundled local store:
//! - Writes inside a transaction are invisible until commit
//! - Failed work rolls back every write
//! - A commit racing another write fails with a retryable conflict
//! - Validators are enforced on every write path
//! - The catalog survives reopening the data directory

use aeroschema::store::{
    run_in_transaction, LocalStore, Session, Store, StoreError, CATALOG_FILE,
};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn store_with(collection: &str) -> LocalStore {
    let store = LocalStore::in_memory();
    store.create_collection(collection).unwrap();
    store
}

// =============================================================================
// Isolation Tests
// =============================================================================

/// Uncommitted writes are visible inside the transaction only.
#[test]
fn test_uncommitted_writes_invisible() {
    let store = store_with("c");
    let tx = store.start_transaction().unwrap();

    tx.insert_one("c", json!({"_id": "1", "v": 1})).unwrap();
    assert_eq!(tx.find_all("c").unwrap().len(), 1);
    assert!(store.find_all("c").unwrap().is_empty());

    tx.commit().unwrap();
    assert_eq!(store.find_all("c").unwrap().len(), 1);
}

/// Dropping a transaction without committing aborts it.
#[test]
fn test_dropped_transaction_aborts() {
    let store = store_with("c");
    {
        let tx = store.start_transaction().unwrap();
        tx.insert_one("c", json!({"_id": "1"})).unwrap();
    }

    assert!(store.find_all("c").unwrap().is_empty());
    assert_eq!(store.stats().transactions_aborted, 1);
}

// =============================================================================
// Rollback Tests
// =============================================================================

/// An error from the work closure discards all of its writes.
#[test]
fn test_rollback_on_error() {
    let store = store_with("c");
    let version = store.version();

    let result: Result<(), StoreError> = run_in_transaction(&store, |tx| {
        tx.create_collection("d")?;
        tx.insert_one("c", json!({"_id": "1"}))?;
        Err(StoreError::Internal("stop".into()))
    });

    assert!(result.is_err());
    assert!(store.find_all("c").unwrap().is_empty());
    assert!(store
        .list_collections(&["d".to_string()])
        .unwrap()
        .is_empty());
    assert_eq!(store.version(), version);
}

/// Successful work commits once.
#[test]
fn test_commit_on_success() {
    let store = store_with("c");

    let inserted = run_in_transaction(&store, |tx| {
        tx.insert_one("c", json!({"_id": "1"}))?;
        tx.insert_one("c", json!({"_id": "2"}))?;
        Ok::<_, StoreError>(2)
    })
    .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(store.find_all("c").unwrap().len(), 2);
    assert_eq!(store.stats().transactions_committed, 1);
}

// =============================================================================
// Conflict Tests
// =============================================================================

/// A write landing between start and commit fails the commit.
#[test]
fn test_write_conflict() {
    let store = store_with("c");
    let tx = store.start_transaction().unwrap();
    tx.insert_one("c", json!({"_id": "1"})).unwrap();

    store.insert_one("c", json!({"_id": "2"})).unwrap();

    let err = tx.commit().unwrap_err();
    assert!(matches!(err, StoreError::WriteConflict(_)));
    assert!(err.is_transient());

    let ids: Vec<String> = store
        .find_all("c")
        .unwrap()
        .iter()
        .map(|d| d["_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["2".to_string()]);
}

/// A read-only transaction still commits after concurrent reads.
#[test]
fn test_reads_do_not_conflict() {
    let store = store_with("c");
    let tx = store.start_transaction().unwrap();

    store.find_all("c").unwrap();
    tx.find_all("c").unwrap();
    assert!(tx.commit().is_ok());
}

/// Clones of a store share one catalog.
#[test]
fn test_clones_share_catalog() {
    let store = store_with("c");
    let other = store.clone();

    other.insert_one("c", json!({"_id": "1"})).unwrap();
    assert_eq!(store.find_all("c").unwrap().len(), 1);
    assert_eq!(store.version(), other.version());
}

// =============================================================================
// Validation Tests
// =============================================================================

/// The collection validator rejects bad inserts and replacements.
#[test]
fn test_validator_enforced() {
    let store = store_with("c");
    store
        .set_validator(
            "c",
            &json!({"$jsonSchema": {
                "bsonType": "object",
                "title": "TagDoc",
                "properties": {"name": {"bsonType": "string"}}
            }}),
        )
        .unwrap();

    store.insert_one("c", json!({"_id": "1", "name": "a"})).unwrap();

    let err = store
        .insert_one("c", json!({"_id": "2", "name": 5}))
        .unwrap_err();
    assert_eq!(err.code(), "AERO_STORE_VALIDATION_FAILED");

    let err = store
        .replace_one("c", "1", json!({"_id": "1", "extra": true}), false)
        .unwrap_err();
    assert!(matches!(err, StoreError::ValidationFailed { .. }));
}

/// Unknown collections fail writes and list reads, but single lookups miss.
#[test]
fn test_missing_collection() {
    let store = LocalStore::in_memory();

    assert!(matches!(
        store.insert_one("nope", json!({"_id": "1"})),
        Err(StoreError::CollectionNotFound(_))
    ));
    assert!(matches!(
        store.find_all("nope"),
        Err(StoreError::CollectionNotFound(_))
    ));
    assert!(store
        .find_one("nope", "_id", &json!("1"))
        .unwrap()
        .is_none());
}

// =============================================================================
// Durability Tests
// =============================================================================

/// Committed writes are in the catalog file and reload from it.
#[test]
fn test_catalog_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let store = LocalStore::open(dir.path()).unwrap();
        run_in_transaction(&store, |tx| {
            tx.create_collection("c")?;
            tx.insert_one("c", json!({"_id": "1", "v": 1}))
        })
        .unwrap();
        assert_eq!(store.path(), Some(dir.path().join(CATALOG_FILE).as_path()));
    }

    assert!(dir.path().join(CATALOG_FILE).exists());
    let reopened = LocalStore::open(dir.path()).unwrap();
    assert_eq!(
        reopened.find_one("c", "_id", &json!("1")).unwrap(),
        Some(json!({"_id": "1", "v": 1}))
    );
    assert_eq!(reopened.version(), 1);
}

/// An in-memory store never touches disk.
#[test]
fn test_in_memory_has_no_path() {
    let store = store_with("c");
    assert!(store.path().is_none());
}
