//! Local document store
//!
//! A catalog of named collections held in memory and optionally persisted
//! to `<data_dir>/catalog.json`. Every durable write replaces the catalog
//! wholesale: the new catalog is built on a copy, written to a temporary
//! file, renamed over the old one, and only then swapped in. Readers see
//! either the old or the new catalog, never a partial one.
//!
//! Transactions work on a private copy of the catalog taken at start. On
//! commit the copy replaces the catalog only if no other write landed in
//! between; otherwise the commit fails with `WriteConflict` and nothing is
//! applied.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::index::IndexSpec;
use super::session::{Session, Store, Transaction};
use crate::observability::{Event, Logger};
use crate::validator::{DocumentValidator, SchemaProperty};

/// Catalog file name inside the data directory
pub const CATALOG_FILE: &str = "catalog.json";

/// Counters of store-level side effects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub collections_created: u64,
    pub collections_dropped: u64,
    pub indexes_created: u64,
    pub validators_written: u64,
    pub transactions_committed: u64,
    pub transactions_aborted: u64,
}

impl StoreStats {
    fn add(&mut self, other: &StoreStats) {
        self.collections_created += other.collections_created;
        self.collections_dropped += other.collections_dropped;
        self.indexes_created += other.indexes_created;
        self.validators_written += other.validators_written;
        self.transactions_committed += other.transactions_committed;
        self.transactions_aborted += other.transactions_aborted;
    }

    /// Provisioning writes recorded since `earlier`
    pub fn provisioning_since(&self, earlier: &StoreStats) -> u64 {
        (self.collections_created - earlier.collections_created)
            + (self.indexes_created - earlier.indexes_created)
            + (self.validators_written - earlier.validators_written)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CollectionState {
    #[serde(default)]
    documents: BTreeMap<String, Value>,
    #[serde(default)]
    indexes: Vec<IndexSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validator: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Catalog {
    version: u64,
    collections: BTreeMap<String, CollectionState>,
}

impl Catalog {
    fn collection(&self, name: &str) -> StoreResult<&CollectionState> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> StoreResult<&mut CollectionState> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn list_collections(&self, names: &[String]) -> BTreeSet<String> {
        names
            .iter()
            .filter(|name| self.collections.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    fn create_collection(&mut self, name: &str, stats: &mut StoreStats) -> StoreResult<()> {
        if self.collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        self.collections
            .insert(name.to_string(), CollectionState::default());
        stats.collections_created += 1;
        Ok(())
    }

    fn drop_collection(&mut self, name: &str, stats: &mut StoreStats) -> bool {
        let existed = self.collections.remove(name).is_some();
        if existed {
            stats.collections_dropped += 1;
        }
        existed
    }

    fn create_index(
        &mut self,
        collection: &str,
        index: &IndexSpec,
        stats: &mut StoreStats,
    ) -> StoreResult<bool> {
        let state = self.collection_mut(collection)?;
        if state.indexes.iter().any(|existing| existing.keys == index.keys) {
            return Ok(false);
        }

        if index.unique {
            let mut seen = HashSet::new();
            for document in state.documents.values() {
                if let Some(key) = index.key_of(document) {
                    if !seen.insert(serde_json::to_string(&key)?) {
                        return Err(StoreError::DuplicateKey {
                            collection: collection.to_string(),
                            index: index.name(),
                        });
                    }
                }
            }
        }

        state.indexes.push(index.clone());
        stats.indexes_created += 1;
        Ok(true)
    }

    fn set_validator(
        &mut self,
        collection: &str,
        validator: &Value,
        stats: &mut StoreStats,
    ) -> StoreResult<()> {
        self.collection_mut(collection)?.validator = Some(validator.clone());
        stats.validators_written += 1;
        Ok(())
    }

    fn insert_one(&mut self, collection: &str, document: Value) -> StoreResult<()> {
        let id = document_id(&document)?;
        let state = self.collection_mut(collection)?;

        if state.documents.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                index: "_id_".to_string(),
            });
        }
        check_document(state, collection, &id, &document)?;

        state.documents.insert(id, document);
        Ok(())
    }

    fn replace_one(
        &mut self,
        collection: &str,
        id: &str,
        document: Value,
        upsert: bool,
    ) -> StoreResult<bool> {
        if document_id(&document)? != id {
            return Err(StoreError::InvalidDocument(format!(
                "replacement for '{}' carries a different _id",
                id
            )));
        }

        let state = self.collection_mut(collection)?;
        if !upsert && !state.documents.contains_key(id) {
            return Ok(false);
        }
        check_document(state, collection, id, &document)?;

        state.documents.insert(id.to_string(), document);
        Ok(true)
    }

    fn delete_one(&mut self, collection: &str, id: &str) -> bool {
        self.collections
            .get_mut(collection)
            .map(|state| state.documents.remove(id).is_some())
            .unwrap_or(false)
    }

    fn find_by_field(&self, collection: &str, field: &str, value: &Value) -> Vec<Value> {
        self.collections
            .get(collection)
            .map(|state| {
                state
                    .documents
                    .values()
                    .filter(|doc| doc.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn document_id(document: &Value) -> StoreResult<String> {
    document
        .get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidDocument("document has no string _id".into()))
}

/// Runs the collection's validator and unique indexes against a document.
fn check_document(
    state: &CollectionState,
    collection: &str,
    id: &str,
    document: &Value,
) -> StoreResult<()> {
    if let Some(validator) = &state.validator {
        let spec = SchemaProperty::from_validator_document(validator).ok_or_else(|| {
            StoreError::Internal(format!("collection '{}' has an unreadable validator", collection))
        })?;
        DocumentValidator::new(&spec)
            .validate_document(document)
            .map_err(|details| StoreError::ValidationFailed {
                collection: collection.to_string(),
                details: details.to_string(),
            })?;
    }

    for index in state.indexes.iter().filter(|index| index.unique) {
        let key = match index.key_of(document) {
            Some(key) => key,
            None => continue,
        };
        let clash = state
            .documents
            .iter()
            .any(|(other_id, other)| other_id != id && index.key_of(other).as_ref() == Some(&key));
        if clash {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                index: index.name(),
            });
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct StoreState {
    catalog: Catalog,
    stats: StoreStats,
}

/// Shared handle on a local catalog.
///
/// Clones share the same catalog, so independent references opened from
/// clones of one store observe each other's commits.
#[derive(Debug, Clone)]
pub struct LocalStore {
    state: Arc<Mutex<StoreState>>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Creates a store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            path: None,
        }
    }

    /// Opens (or initializes) the catalog inside `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;

        let path = data_dir.join(CATALOG_FILE);
        let catalog = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Catalog::default()
        };

        Ok(Self {
            state: Arc::new(Mutex::new(StoreState {
                catalog,
                stats: StoreStats::default(),
            })),
            path: Some(path),
        })
    }

    /// Catalog file backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Side-effect counters since the store was opened
    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }

    /// Version of the committed catalog; bumps on every effective write
    pub fn version(&self) -> u64 {
        self.lock().catalog.version
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, read: impl FnOnce(&Catalog) -> T) -> T {
        read(&self.lock().catalog)
    }

    /// Applies one autocommitted write.
    fn write<T>(
        &self,
        write: impl FnOnce(&mut Catalog, &mut StoreStats) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self.lock();
        let mut next = state.catalog.clone();
        let mut delta = StoreStats::default();

        let out = write(&mut next, &mut delta)?;

        if next != state.catalog {
            next.version += 1;
            self.persist(&next)?;
            state.catalog = next;
        }
        state.stats.add(&delta);
        Ok(out)
    }

    fn persist(&self, catalog: &Catalog) -> StoreResult<()> {
        if let Some(path) = &self.path {
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, serde_json::to_vec_pretty(catalog)?)?;
            fs::rename(&tmp, path)?;
        }
        Ok(())
    }
}

impl Session for LocalStore {
    fn list_collections(&self, names: &[String]) -> StoreResult<BTreeSet<String>> {
        Ok(self.read(|c| c.list_collections(names)))
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.read(|c| c.collections.keys().cloned().collect()))
    }

    fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.write(|c, stats| c.create_collection(name, stats))
    }

    fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        self.write(|c, stats| Ok(c.drop_collection(name, stats)))
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> StoreResult<bool> {
        self.write(|c, stats| c.create_index(collection, index, stats))
    }

    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>> {
        self.read(|c| c.collection(collection).map(|s| s.indexes.clone()))
    }

    fn set_validator(&self, collection: &str, validator: &Value) -> StoreResult<()> {
        self.write(|c, stats| c.set_validator(collection, validator, stats))
    }

    fn get_validator(&self, collection: &str) -> StoreResult<Option<Value>> {
        self.read(|c| c.collection(collection).map(|s| s.validator.clone()))
    }

    fn insert_one(&self, collection: &str, document: Value) -> StoreResult<()> {
        self.write(|c, _| c.insert_one(collection, document))
    }

    fn find_one(&self, collection: &str, field: &str, value: &Value) -> StoreResult<Option<Value>> {
        Ok(self.read(|c| c.find_by_field(collection, field, value).into_iter().next()))
    }

    fn find_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.read(|c| {
            c.collection(collection)
                .map(|s| s.documents.values().cloned().collect())
        })
    }

    fn replace_one(
        &self,
        collection: &str,
        id: &str,
        document: Value,
        upsert: bool,
    ) -> StoreResult<bool> {
        self.write(|c, _| c.replace_one(collection, id, document, upsert))
    }

    fn delete_one(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.write(|c, _| Ok(c.delete_one(collection, id)))
    }
}

impl Store for LocalStore {
    fn start_transaction(&self) -> StoreResult<Box<dyn Transaction>> {
        let state = self.lock();
        let base_version = state.catalog.version;
        let working = state.catalog.clone();
        drop(state);

        Logger::trace(
            Event::TransactionBegin.as_str(),
            &[("base_version", base_version.to_string().as_str())],
        );

        Ok(Box::new(LocalTransaction {
            store: self.clone(),
            base_version,
            working: RefCell::new(working),
            stats: RefCell::new(StoreStats::default()),
            finished: Cell::new(false),
        }))
    }

    fn as_session(&self) -> &dyn Session {
        self
    }
}

/// A transaction over a private copy of the catalog
pub struct LocalTransaction {
    store: LocalStore,
    base_version: u64,
    working: RefCell<Catalog>,
    stats: RefCell<StoreStats>,
    finished: Cell<bool>,
}

impl LocalTransaction {
    fn read<T>(&self, read: impl FnOnce(&Catalog) -> T) -> T {
        read(&self.working.borrow())
    }

    fn write<T>(
        &self,
        write: impl FnOnce(&mut Catalog, &mut StoreStats) -> StoreResult<T>,
    ) -> StoreResult<T> {
        if self.finished.get() {
            return Err(StoreError::TransactionClosed);
        }
        write(&mut self.working.borrow_mut(), &mut self.stats.borrow_mut())
    }
}

impl Session for LocalTransaction {
    fn list_collections(&self, names: &[String]) -> StoreResult<BTreeSet<String>> {
        Ok(self.read(|c| c.list_collections(names)))
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.read(|c| c.collections.keys().cloned().collect()))
    }

    fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.write(|c, stats| c.create_collection(name, stats))
    }

    fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        self.write(|c, stats| Ok(c.drop_collection(name, stats)))
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> StoreResult<bool> {
        self.write(|c, stats| c.create_index(collection, index, stats))
    }

    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>> {
        self.read(|c| c.collection(collection).map(|s| s.indexes.clone()))
    }

    fn set_validator(&self, collection: &str, validator: &Value) -> StoreResult<()> {
        self.write(|c, stats| c.set_validator(collection, validator, stats))
    }

    fn get_validator(&self, collection: &str) -> StoreResult<Option<Value>> {
        self.read(|c| c.collection(collection).map(|s| s.validator.clone()))
    }

    fn insert_one(&self, collection: &str, document: Value) -> StoreResult<()> {
        self.write(|c, _| c.insert_one(collection, document))
    }

    fn find_one(&self, collection: &str, field: &str, value: &Value) -> StoreResult<Option<Value>> {
        Ok(self.read(|c| c.find_by_field(collection, field, value).into_iter().next()))
    }

    fn find_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.read(|c| {
            c.collection(collection)
                .map(|s| s.documents.values().cloned().collect())
        })
    }

    fn replace_one(
        &self,
        collection: &str,
        id: &str,
        document: Value,
        upsert: bool,
    ) -> StoreResult<bool> {
        self.write(|c, _| c.replace_one(collection, id, document, upsert))
    }

    fn delete_one(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.write(|c, _| Ok(c.delete_one(collection, id)))
    }
}

impl Transaction for LocalTransaction {
    fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut state = self.store.lock();

        if state.catalog.version != self.base_version {
            let current = state.catalog.version;
            drop(state);
            return Err(StoreError::WriteConflict(format!(
                "catalog moved from version {} to {} during the transaction",
                self.base_version, current
            )));
        }

        let mut next = self.working.replace(Catalog::default());
        if next != state.catalog {
            next.version = self.base_version + 1;
            self.store.persist(&next)?;
            state.catalog = next;
        }

        let mut delta = *self.stats.borrow();
        delta.transactions_committed += 1;
        state.stats.add(&delta);
        self.finished.set(true);

        Logger::trace(
            Event::TransactionCommit.as_str(),
            &[("version", state.catalog.version.to_string().as_str())],
        );
        Ok(())
    }

    fn abort(self: Box<Self>) {
        // Dropping discards the working copy
    }

    fn as_session(&self) -> &dyn Session {
        self
    }
}

impl Drop for LocalTransaction {
    fn drop(&mut self) {
        if !self.finished.get() {
            self.finished.set(true);
            self.store.lock().stats.transactions_aborted += 1;
            Logger::trace(
                Event::TransactionAbort.as_str(),
                &[("base_version", self.base_version.to_string().as_str())],
            );
        }
    }
}
