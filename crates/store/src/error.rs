//! Persistence error types for the SurrealDB store.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::fmt;

use snaprestore_lifecycle::{EntityKind, StoreError};
use thiserror::Error;

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to connect to the database
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Query execution failed
    #[error("query failed: {reason}")]
    QueryFailed { reason: String },

    /// Record not found
    #[error("record not found: {entity} with id '{id}'")]
    NotFound { entity: EntityKind, id: String },

    /// Record already exists
    #[error("record already exists: {entity} with id '{id}'")]
    AlreadyExists { entity: EntityKind, id: String },

    /// Serialization/deserialization error
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    /// Timeout waiting for operation
    #[error("operation timed out: {reason}")]
    Timeout { reason: String },

    /// Schema error
    #[error("schema error: {reason}")]
    SchemaError { reason: String },
}

impl PersistenceError {
    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a query failed error.
    pub fn query_failed(reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization_error(reason: impl Into<String>) -> Self {
        Self::SerializationError {
            reason: reason.into(),
        }
    }

    /// Create a schema error.
    pub fn schema_error(reason: impl Into<String>) -> Self {
        Self::SchemaError {
            reason: reason.into(),
        }
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Helper to convert SurrealDB errors to PersistenceError.
pub fn from_surrealdb_error(err: impl fmt::Display) -> PersistenceError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();

    // Categorize based on error message patterns
    if lower.contains("timeout") || lower.contains("timed out") {
        PersistenceError::Timeout { reason: msg }
    } else if lower.contains("connection") || lower.contains("connect") {
        PersistenceError::connection_failed(msg)
    } else if lower.contains("deserializ") || lower.contains("serializ") {
        PersistenceError::serialization_error(msg)
    } else {
        PersistenceError::query_failed(msg)
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound { entity, id },
            PersistenceError::AlreadyExists { entity, id } => Self::AlreadyExists { entity, id },
            PersistenceError::SerializationError { reason } => Self::Serialization { reason },
            other => Self::unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_error() {
        let err = PersistenceError::connection_failed("host unreachable");
        assert!(matches!(err, PersistenceError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = PersistenceError::not_found(EntityKind::Restoration, "r-123");
        assert_eq!(
            err.to_string(),
            "record not found: restoration with id 'r-123'"
        );
    }

    #[test]
    fn test_from_surrealdb_error_timeout() {
        let err = from_surrealdb_error("operation timeout after 30s");
        assert!(matches!(err, PersistenceError::Timeout { .. }));
    }

    #[test]
    fn test_from_surrealdb_error_connection() {
        let err = from_surrealdb_error("Connection refused");
        assert!(matches!(err, PersistenceError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_from_surrealdb_error_fallback() {
        let err = from_surrealdb_error("Parse error: unexpected token");
        assert!(matches!(err, PersistenceError::QueryFailed { .. }));
    }

    #[test]
    fn test_into_store_error() {
        let conflict: StoreError =
            PersistenceError::already_exists(EntityKind::Restoration, "r-1").into();
        assert!(matches!(conflict, StoreError::AlreadyExists { .. }));

        let down: StoreError = PersistenceError::connection_failed("refused").into();
        assert!(matches!(down, StoreError::Unavailable { .. }));

        let bad: StoreError = PersistenceError::serialization_error("missing field").into();
        assert!(matches!(bad, StoreError::Serialization { .. }));
    }
}
