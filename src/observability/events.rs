//! Observability events for aeroschema
//!
//! Events are explicit and typed. Every log line names exactly one event.

use std::fmt;

/// Observable events in aeroschema
///
/// These events cover:
/// - Dataset lifecycle
/// - Schema commits and merges
/// - Collection, index and validator provisioning
/// - Store transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Dataset lifecycle
    /// Dataset definition created
    DatasetCreated,
    /// Dataset definition loaded from the store
    DatasetLoaded,
    /// Dataset and its backing collections deleted
    DatasetDeleted,
    /// Migration hook invoked before hydration
    MigrationInvoked,

    // Schema commits
    /// Delta between the original and the edited schema computed
    MergeComputed,
    /// Merged schema persisted
    SchemaCommitted,

    // Provisioning
    /// Backing collection created
    CollectionCreated,
    /// Backing collection dropped
    CollectionDropped,
    /// Index created on a backing collection
    IndexCreated,
    /// Validator installed or replaced
    ValidatorInstalled,
    /// Validator already matched, no write issued
    ValidatorUnchanged,
    /// Validator missing at load; persisted descriptor used instead
    ValidatorFallback,

    // Records
    /// Record written to the root collection
    RecordSaved,

    // Transactions
    /// Transaction started
    TransactionBegin,
    /// Transaction committed
    TransactionCommit,
    /// Transaction aborted
    TransactionAbort,
}

impl Event {
    /// Returns the event name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DatasetCreated => "DATASET_CREATED",
            Event::DatasetLoaded => "DATASET_LOADED",
            Event::DatasetDeleted => "DATASET_DELETED",
            Event::MigrationInvoked => "MIGRATION_INVOKED",
            Event::MergeComputed => "MERGE_COMPUTED",
            Event::SchemaCommitted => "SCHEMA_COMMITTED",
            Event::CollectionCreated => "COLLECTION_CREATED",
            Event::CollectionDropped => "COLLECTION_DROPPED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::ValidatorInstalled => "VALIDATOR_INSTALLED",
            Event::ValidatorUnchanged => "VALIDATOR_UNCHANGED",
            Event::ValidatorFallback => "VALIDATOR_FALLBACK",
            Event::RecordSaved => "RECORD_SAVED",
            Event::TransactionBegin => "TRANSACTION_BEGIN",
            Event::TransactionCommit => "TRANSACTION_COMMIT",
            Event::TransactionAbort => "TRANSACTION_ABORT",
        }
    }

    /// Returns true for events that indicate a degraded path
    pub fn is_warning(&self) -> bool {
        matches!(self, Event::ValidatorFallback | Event::TransactionAbort)
    }

    /// Returns all events
    pub fn all() -> &'static [Event] {
        &[
            Event::ConfigLoaded,
            Event::DatasetCreated,
            Event::DatasetLoaded,
            Event::DatasetDeleted,
            Event::MigrationInvoked,
            Event::MergeComputed,
            Event::SchemaCommitted,
            Event::CollectionCreated,
            Event::CollectionDropped,
            Event::IndexCreated,
            Event::ValidatorInstalled,
            Event::ValidatorUnchanged,
            Event::ValidatorFallback,
            Event::RecordSaved,
            Event::TransactionBegin,
            Event::TransactionCommit,
            Event::TransactionAbort,
        ]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
