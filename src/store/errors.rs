//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    // Collection errors
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    // Document errors
    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Duplicate key in {collection}: index '{index}'")]
    DuplicateKey { collection: String, index: String },

    #[error("Document failed validation in {collection}: {details}")]
    ValidationFailed { collection: String, details: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    // Transaction errors
    #[error("Write conflict on commit: {0}")]
    WriteConflict(String),

    #[error("Transaction already closed")]
    TransactionClosed,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::CollectionNotFound(_) => "AERO_STORE_COLLECTION_NOT_FOUND",
            StoreError::CollectionExists(_) => "AERO_STORE_COLLECTION_EXISTS",
            StoreError::DocumentNotFound { .. } => "AERO_STORE_DOCUMENT_NOT_FOUND",
            StoreError::DuplicateKey { .. } => "AERO_STORE_DUPLICATE_KEY",
            StoreError::ValidationFailed { .. } => "AERO_STORE_VALIDATION_FAILED",
            StoreError::InvalidDocument(_) => "AERO_STORE_INVALID_DOCUMENT",
            StoreError::WriteConflict(_) => "AERO_STORE_WRITE_CONFLICT",
            StoreError::TransactionClosed => "AERO_STORE_TRANSACTION_CLOSED",
            StoreError::Io(_) => "AERO_STORE_IO_ERROR",
            StoreError::Serialization(_) => "AERO_STORE_SERIALIZATION_ERROR",
            StoreError::Internal(_) => "AERO_STORE_INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may retry the whole operation
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::WriteConflict(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
