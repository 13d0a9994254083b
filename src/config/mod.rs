//! Configuration for aeroschema
//!
//! Read from a single JSON file. Only `data_dir` is required; every other
//! key has a default. The special data dir `:memory:` selects a store that
//! is never written to disk.

mod errors;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use errors::{ConfigError, ConfigResult};

use crate::observability::{Event, Logger};
use crate::reference::{Connection, Settings, DEFAULT_DEFINITIONS_COLLECTION};
use crate::schema::ClassRegistry;
use crate::store::{LocalStore, StoreResult};

/// Data dir value selecting an in-memory store
pub const IN_MEMORY: &str = ":memory:";

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the store catalog (required)
    pub data_dir: String,

    /// Collection holding dataset definitions (default "datasets")
    #[serde(default = "default_definitions_collection")]
    pub definitions_collection: String,

    /// Whether new datasets are persistent unless told otherwise
    #[serde(default)]
    pub default_persistent: bool,

    /// Version stamped into new definitions (default: crate version)
    #[serde(default = "default_version")]
    pub version: String,

    /// tracing-subscriber filter directive (default "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_definitions_collection() -> String {
    DEFAULT_DEFINITIONS_COLLECTION.to_string()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config = Self::from_json(&content)?;
        let path_str = path.display().to_string();
        Logger::info(
            Event::ConfigLoaded.as_str(),
            &[
                ("path", path_str.as_str()),
                ("data_dir", config.data_dir.as_str()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration backed by an in-memory store
    pub fn in_memory() -> Self {
        Self {
            data_dir: IN_MEMORY.to_string(),
            definitions_collection: default_definitions_collection(),
            default_persistent: false,
            version: default_version(),
            log_filter: default_log_filter(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }

        if self.definitions_collection.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "definitions_collection must not be empty".into(),
            ));
        }

        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".into()));
        }

        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.data_dir == IN_MEMORY
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Connection settings derived from this configuration
    pub fn settings(&self) -> Settings {
        Settings {
            definitions_collection: self.definitions_collection.clone(),
            version: self.version.clone(),
            default_persistent: self.default_persistent,
        }
    }

    pub fn open_store(&self) -> StoreResult<LocalStore> {
        if self.is_in_memory() {
            Ok(LocalStore::in_memory())
        } else {
            LocalStore::open(self.data_path())
        }
    }

    /// Opens the store and wraps it in a connection
    pub fn connect(&self, classes: ClassRegistry) -> StoreResult<Connection> {
        let store = self.open_store()?;
        Ok(Connection::new(Arc::new(store), classes).with_settings(self.settings()))
    }
}
