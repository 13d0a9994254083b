//! Explicit connection passed to every schema reference
//!
//! Bundles the backing store, the registry that resolves document classes
//! by name, the migration hook and the settings derived from configuration.
//! There is no process-wide connection.

use std::fmt;
use std::sync::Arc;

use crate::schema::{ClassRegistry, SchemaResult};
use crate::store::{IndexSpec, Session, Store, StoreResult};

/// Default name of the definitions collection
pub const DEFAULT_DEFINITIONS_COLLECTION: &str = "datasets";

/// Schema-version upgrade hook run before a dataset is hydrated.
///
/// May rewrite the persisted definition out-of-band.
pub trait Migrator: Send + Sync + fmt::Debug {
    fn migrate_if_necessary(&self, store: &dyn Store, name: &str) -> SchemaResult<()>;
}

/// Migrator that leaves every dataset untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMigrator;

impl Migrator for NoopMigrator {
    fn migrate_if_necessary(&self, _store: &dyn Store, _name: &str) -> SchemaResult<()> {
        Ok(())
    }
}

/// Connection-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub definitions_collection: String,
    pub version: String,
    pub default_persistent: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            definitions_collection: DEFAULT_DEFINITIONS_COLLECTION.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            default_persistent: false,
        }
    }
}

/// Handle through which references reach the backing store
#[derive(Debug, Clone)]
pub struct Connection {
    store: Arc<dyn Store>,
    classes: Arc<ClassRegistry>,
    migrator: Arc<dyn Migrator>,
    settings: Settings,
}

impl Connection {
    pub fn new(store: Arc<dyn Store>, classes: ClassRegistry) -> Self {
        Self {
            store,
            classes: Arc::new(classes),
            migrator: Arc::new(NoopMigrator),
            settings: Settings::default(),
        }
    }

    pub fn with_migrator(mut self, migrator: Arc<dyn Migrator>) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn migrator(&self) -> &dyn Migrator {
        self.migrator.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Name of the collection holding dataset definitions
    pub fn definitions(&self) -> &str {
        &self.settings.definitions_collection
    }

    /// Creates the definitions collection and its unique name index if missing.
    pub(crate) fn ensure_definitions(&self, session: &dyn Session) -> StoreResult<()> {
        let name = self.definitions();
        if session.list_collections(&[name.to_string()])?.is_empty() {
            session.create_collection(name)?;
        }
        session.create_index(name, &IndexSpec::ascending("name").unique())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.definitions_collection, "datasets");
        assert_eq!(settings.version, env!("CARGO_PKG_VERSION"));
        assert!(!settings.default_persistent);
    }

    #[test]
    fn test_ensure_definitions_is_idempotent() {
        let store = LocalStore::in_memory();
        let conn = Connection::new(Arc::new(store.clone()), ClassRegistry::new());

        conn.ensure_definitions(&store).unwrap();
        conn.ensure_definitions(&store).unwrap();

        assert_eq!(store.stats().collections_created, 1);
        assert_eq!(store.stats().indexes_created, 1);
        assert_eq!(store.list_indexes("datasets").unwrap().len(), 1);
    }
}
