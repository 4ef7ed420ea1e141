//! Error types for the lifecycle crate.

use std::fmt;

use thiserror::Error;

use crate::types::{RestoreStatus, SnapshotStatus};

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, RestoreError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Kind of entity a lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Snapshot,
    Restoration,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Restoration => write!(f, "restoration"),
        }
    }
}

/// Failures reported by a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version is not the one the write was based on.
    #[error(
        "version conflict on restoration '{restoration_id}': expected stored version {expected}, found {found:?}"
    )]
    VersionConflict {
        restoration_id: String,
        expected: u64,
        found: Option<u64>,
    },

    /// A record with this key already exists.
    #[error("{entity} '{id}' already exists")]
    AlreadyExists { entity: EntityKind, id: String },

    /// The record a write targets does not exist.
    #[error("{entity} '{id}' not found in store")]
    NotFound { entity: EntityKind, id: String },

    /// The backend could not be reached or rejected the operation.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A record could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl StoreError {
    /// Create an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the restore orchestrator and completion handler.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// A referenced snapshot or restoration does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },

    /// The snapshot already has an active restoration.
    #[error(
        "snapshot '{snapshot_id}' already has active restoration '{restoration_id}' ({status})"
    )]
    Conflict {
        snapshot_id: String,
        restoration_id: String,
        status: RestoreStatus,
    },

    /// The snapshot exists but cannot be restored yet.
    #[error("snapshot '{snapshot_id}' is not eligible for restore (status {status})")]
    SnapshotNotEligible {
        snapshot_id: String,
        status: SnapshotStatus,
    },

    /// The request is malformed.
    #[error("invalid restore request: {reason}")]
    InvalidRequest { reason: String },

    /// The transition is not an edge of the state machine.
    #[error("restoration '{restoration_id}' cannot move from {from} to {to}")]
    InvalidStateTransition {
        restoration_id: String,
        from: RestoreStatus,
        to: RestoreStatus,
    },

    /// Another writer changed the record between read and write.
    #[error("restoration '{restoration_id}' was modified concurrently")]
    ConcurrentModification { restoration_id: String },

    /// The durable store failed.
    #[error("persistence failure during {operation}: {source}")]
    Persistence {
        operation: String,
        #[source]
        source: StoreError,
    },
}

impl RestoreError {
    /// Create a not found error.
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Create an invalid state transition error.
    pub fn invalid_transition(
        restoration_id: impl Into<String>,
        from: RestoreStatus,
        to: RestoreStatus,
    ) -> Self {
        Self::InvalidStateTransition {
            restoration_id: restoration_id.into(),
            from,
            to,
        }
    }

    /// Wrap a store failure raised during `operation`.
    ///
    /// Version conflicts, and a create racing another writer for the same
    /// restoration id, become `ConcurrentModification`.
    pub fn persistence(operation: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::VersionConflict { restoration_id, .. }
            | StoreError::AlreadyExists {
                entity: EntityKind::Restoration,
                id: restoration_id,
            } => Self::ConcurrentModification { restoration_id },
            source => Self::Persistence {
                operation: operation.into(),
                source,
            },
        }
    }

    /// Check if redelivering the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. } | Self::ConcurrentModification { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RestoreError::invalid_transition(
            "restoration-id",
            RestoreStatus::RestorationComplete,
            RestoreStatus::Error,
        );
        assert_eq!(
            err.to_string(),
            "restoration 'restoration-id' cannot move from RESTORATION_COMPLETE to ERROR"
        );
    }

    #[test]
    fn test_version_conflict_becomes_concurrent_modification() {
        let err = RestoreError::persistence(
            "apply_transition",
            StoreError::VersionConflict {
                restoration_id: "r1".to_string(),
                expected: 2,
                found: Some(3),
            },
        );
        assert!(matches!(err, RestoreError::ConcurrentModification { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classification() {
        assert!(!RestoreError::not_found(EntityKind::Snapshot, "s").is_retryable());

        let persistence =
            RestoreError::persistence("save", StoreError::unavailable("connection refused"));
        assert!(persistence.is_retryable());
    }
}
