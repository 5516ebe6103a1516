//! # Error Handling Module
//!
//! Provides structured error types for kitdb builds.
//! Every error aborts the build; nothing here is retried.

use std::path::Path;

use thiserror::Error;

/// Result type alias for kitdb operations
pub type KitDbResult<T> = Result<T, KitDbError>;

/// Comprehensive error type for all kitdb operations
#[derive(Error, Debug)]
pub enum KitDbError {
    /// A document lacks a field its table marks NOT NULL
    #[error("Missing required field '{field}' for table '{table}' in {document}")]
    MissingRequiredField {
        table: String,
        field: String,
        document: String,
    },

    /// A document value cannot be stored in its column
    #[error("Value {value} cannot be stored in column '{column}' (expected {expected})")]
    ValueType {
        column: String,
        value: String,
        expected: &'static str,
    },

    /// The artifact file could not be replaced, or a statement failed
    #[error("Artifact error: {0}")]
    ArtifactAccess(String),

    /// A table definition could not be parsed
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid table or column name
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A source document is unreadable or not a JSON object
    #[error("Invalid document {document}: {reason}")]
    InvalidDocument { document: String, reason: String },

    /// JSON parsing or serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or unusable build configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl KitDbError {
    /// Returns a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            KitDbError::MissingRequiredField { .. } => "MISSING_REQUIRED_FIELD",
            KitDbError::ValueType { .. } => "VALUE_TYPE",
            KitDbError::ArtifactAccess(_) => "ARTIFACT_ACCESS",
            KitDbError::Schema(_) => "SCHEMA_ERROR",
            KitDbError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            KitDbError::InvalidDocument { .. } => "INVALID_DOCUMENT",
            KitDbError::Json(_) => "JSON_ERROR",
            KitDbError::Config(_) => "CONFIG_ERROR",
            KitDbError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn invalid_document(path: &Path, reason: impl Into<String>) -> Self {
        KitDbError::InvalidDocument {
            document: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Convert rusqlite errors to KitDbError
impl From<rusqlite::Error> for KitDbError {
    fn from(err: rusqlite::Error) -> Self {
        KitDbError::ArtifactAccess(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = KitDbError::MissingRequiredField {
            table: "kits".to_string(),
            field: "name".to_string(),
            document: "kits/demo/kit.json".to_string(),
        };
        assert_eq!(err.error_code(), "MISSING_REQUIRED_FIELD");
        assert!(err.to_string().contains("'name'"));

        let err: KitDbError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.error_code(), "ARTIFACT_ACCESS");
    }
}
