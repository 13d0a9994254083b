//! Schema error types
//!
//! A single error family is exposed upward. Every kind carries a stable code
//! and is classified as either a precondition failure (the reference or the
//! dataset is not in the state the operation needs) or a validation failure
//! (a value or a type does not agree with the schema).
//!
//! Error codes:
//! - AERO_SCHEMA_ALREADY_EXISTS (PRECONDITION)
//! - AERO_SCHEMA_NOT_ATTACHED (PRECONDITION)
//! - AERO_SCHEMA_DATASET_NOT_FOUND (PRECONDITION)
//! - AERO_SCHEMA_INVALID_KEY (PRECONDITION)
//! - AERO_SCHEMA_MISSING_FIELD_TYPE (VALIDATION)
//! - AERO_SCHEMA_UNRESOLVABLE_DESCRIPTOR (VALIDATION)
//! - AERO_SCHEMA_NULL_VALUE (VALIDATION)
//! - AERO_SCHEMA_TYPE_MISMATCH (VALIDATION)
//! - AERO_SCHEMA_UNKNOWN_FIELD (VALIDATION)
//! - AERO_SCHEMA_INDEX_OUT_OF_BOUNDS (VALIDATION)

use thiserror::Error;

use crate::store::StoreError;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Dataset '{0}' already exists; load it instead of creating it")]
    AlreadyExists(String),

    #[error("Reference has no dataset")]
    NotAttached,

    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Field '{0}' has no type")]
    MissingFieldType(String),

    #[error("Unresolvable descriptor at '{path}': {reason}")]
    UnresolvableDescriptor { path: String, reason: String },

    #[error("Null value at '{0}'")]
    NullValue(String),

    #[error("Type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Index {index} out of bounds at '{path}' (length {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    // Raised by the query layer only; kept here so its kinds stay in one family.
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Unsupported field: {0}")]
    UnsupportedField(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchemaError {
    /// Create a type mismatch error
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        SchemaError::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an unresolvable descriptor error
    pub fn unresolvable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::UnresolvableDescriptor {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::AlreadyExists(_) => "AERO_SCHEMA_ALREADY_EXISTS",
            SchemaError::NotAttached => "AERO_SCHEMA_NOT_ATTACHED",
            SchemaError::DatasetNotFound(_) => "AERO_SCHEMA_DATASET_NOT_FOUND",
            SchemaError::InvalidKey(_) => "AERO_SCHEMA_INVALID_KEY",
            SchemaError::MissingFieldType(_) => "AERO_SCHEMA_MISSING_FIELD_TYPE",
            SchemaError::UnresolvableDescriptor { .. } => "AERO_SCHEMA_UNRESOLVABLE_DESCRIPTOR",
            SchemaError::NullValue(_) => "AERO_SCHEMA_NULL_VALUE",
            SchemaError::TypeMismatch { .. } => "AERO_SCHEMA_TYPE_MISMATCH",
            SchemaError::UnknownField(_) => "AERO_SCHEMA_UNKNOWN_FIELD",
            SchemaError::IndexOutOfBounds { .. } => "AERO_SCHEMA_INDEX_OUT_OF_BOUNDS",
            SchemaError::UnsupportedFilter(_) => "AERO_SCHEMA_UNSUPPORTED_FILTER",
            SchemaError::UnsupportedField(_) => "AERO_SCHEMA_UNSUPPORTED_FIELD",
            SchemaError::Store(e) => e.code(),
        }
    }

    /// Returns true if the operation was attempted in the wrong state
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SchemaError::AlreadyExists(_)
                | SchemaError::NotAttached
                | SchemaError::DatasetNotFound(_)
                | SchemaError::InvalidKey(_)
        )
    }

    /// Returns true if a value or type disagreed with the schema
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SchemaError::MissingFieldType(_)
                | SchemaError::UnresolvableDescriptor { .. }
                | SchemaError::NullValue(_)
                | SchemaError::TypeMismatch { .. }
                | SchemaError::UnknownField(_)
                | SchemaError::IndexOutOfBounds { .. }
                | SchemaError::UnsupportedFilter(_)
                | SchemaError::UnsupportedField(_)
        )
    }

    /// Returns true if retrying the whole operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SchemaError::Store(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SchemaError::AlreadyExists("ds".into()).code(),
            "AERO_SCHEMA_ALREADY_EXISTS"
        );
        assert_eq!(SchemaError::NotAttached.code(), "AERO_SCHEMA_NOT_ATTACHED");
        assert_eq!(
            SchemaError::type_mismatch("tags", "list", "int").code(),
            "AERO_SCHEMA_TYPE_MISMATCH"
        );
    }

    #[test]
    fn test_classification_is_disjoint() {
        let errors = vec![
            SchemaError::AlreadyExists("ds".into()),
            SchemaError::NotAttached,
            SchemaError::NullValue("tags".into()),
            SchemaError::MissingFieldType("label".into()),
            SchemaError::unresolvable("tags", "unknown class"),
        ];

        for err in errors {
            assert!(err.is_precondition() != err.is_validation(), "{}", err);
        }
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = SchemaError::type_mismatch("tags", "document<TagDoc>", "int");
        let display = err.to_string();
        assert!(display.contains("tags"));
        assert!(display.contains("document<TagDoc>"));
        assert!(display.contains("int"));
    }

    #[test]
    fn test_store_errors_propagate_transient_flag() {
        let err = SchemaError::from(StoreError::WriteConflict("datasets".into()));
        assert!(err.is_transient());
        assert!(!err.is_precondition());
        assert!(!err.is_validation());
    }
}
