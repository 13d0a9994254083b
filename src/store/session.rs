//! # Store Traits
//!
//! The schema core issues only these primitive operations against the
//! backing store. It never issues queries beyond single-field equality.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::index::IndexSpec;

/// Primitive operations available both outside and inside a transaction
pub trait Session {
    /// Returns which of `names` exist, in one batched check
    fn list_collections(&self, names: &[String]) -> StoreResult<BTreeSet<String>>;

    /// Returns every collection name
    fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Creates an empty collection; fails if it exists
    fn create_collection(&self, name: &str) -> StoreResult<()>;

    /// Drops a collection, returning whether it existed
    fn drop_collection(&self, name: &str) -> StoreResult<bool>;

    /// Ensures an index exists, returning whether it was created
    fn create_index(&self, collection: &str, index: &IndexSpec) -> StoreResult<bool>;

    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>>;

    /// Installs or replaces the collection's validator document
    fn set_validator(&self, collection: &str, validator: &Value) -> StoreResult<()>;

    fn get_validator(&self, collection: &str) -> StoreResult<Option<Value>>;

    /// Inserts a document carrying a string `_id`
    fn insert_one(&self, collection: &str, document: Value) -> StoreResult<()>;

    /// Finds the first document whose `field` equals `value`
    fn find_one(&self, collection: &str, field: &str, value: &Value) -> StoreResult<Option<Value>>;

    fn find_all(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// Replaces the document with `id`, returning whether one was written
    fn replace_one(&self, collection: &str, id: &str, document: Value, upsert: bool)
        -> StoreResult<bool>;

    /// Deletes the document with `id`, returning whether it existed
    fn delete_one(&self, collection: &str, id: &str) -> StoreResult<bool>;
}

/// A multi-document transaction.
///
/// Dropping a transaction without committing aborts it.
pub trait Transaction: Session {
    /// Makes every write of the transaction durable at once
    fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discards every write of the transaction
    fn abort(self: Box<Self>);

    fn as_session(&self) -> &dyn Session;
}

/// A backing store with multi-document transactions
pub trait Store: Session + Send + Sync + fmt::Debug {
    fn start_transaction(&self) -> StoreResult<Box<dyn Transaction>>;

    fn as_session(&self) -> &dyn Session;
}

/// Runs `work` inside one transaction.
///
/// Commits when `work` succeeds and aborts when it fails, so the
/// transaction is released on every exit path.
pub fn run_in_transaction<T, E>(
    store: &dyn Store,
    work: impl FnOnce(&dyn Session) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError>,
{
    let tx = store.start_transaction()?;

    match work(tx.as_session()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            tx.abort();
            Err(e)
        }
    }
}
