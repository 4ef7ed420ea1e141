//! Snapshot persistence operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use snaprestore_lifecycle::{
    AuditEntry, EntityKind, HistoryTrail, Snapshot, SnapshotCatalog, SnapshotStatus, StoreResult,
};

use crate::client::SurrealStore;
use crate::error::{PersistenceError, PersistenceResult, from_surrealdb_error};

const TABLE: &str = "snapshot";

/// Snapshot record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// SurrealDB record ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    /// Snapshot identifier
    pub snapshot_id: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Archive state
    pub status: SnapshotStatus,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
    /// Audit entries
    #[serde(default)]
    pub history: HistoryTrail,
}

impl From<&Snapshot> for SnapshotRecord {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: None,
            snapshot_id: s.id.clone(),
            description: s.description.clone(),
            status: s.status,
            created_at: s.created_at,
            history: s.history.clone(),
        }
    }
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        Self {
            id: record.snapshot_id,
            description: record.description,
            status: record.status,
            created_at: record.created_at,
            history: record.history,
        }
    }
}

impl SurrealStore {
    /// Save a snapshot, replacing any existing record with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn register_snapshot(&self, snapshot: &Snapshot) -> PersistenceResult<Snapshot> {
        let saved: Option<SnapshotRecord> = self
            .db()
            .upsert((TABLE, snapshot.id.clone()))
            .content(SnapshotRecord::from(snapshot))
            .await
            .map_err(from_surrealdb_error)?;

        saved
            .map(Snapshot::from)
            .ok_or_else(|| PersistenceError::query_failed("failed to save snapshot"))
    }

    /// Get a snapshot by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_snapshot_record(&self, id: &str) -> PersistenceResult<Option<Snapshot>> {
        let record: Option<SnapshotRecord> = self
            .db()
            .select((TABLE, id.to_string()))
            .await
            .map_err(from_surrealdb_error)?;

        Ok(record.map(Snapshot::from))
    }

    /// Append entries to a snapshot's history in one statement.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the snapshot does not exist.
    pub async fn append_snapshot_history(
        &self,
        id: &str,
        entries: &[AuditEntry],
    ) -> PersistenceResult<()> {
        let updated: Vec<SnapshotRecord> = self
            .db()
            .query(
                "UPDATE type::thing($table, $id) \
                 SET history = array::concat(history ?? [], $entries) RETURN AFTER",
            )
            .bind(("table", TABLE))
            .bind(("id", id.to_string()))
            .bind(("entries", entries.to_vec()))
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;

        if updated.is_empty() {
            return Err(PersistenceError::not_found(EntityKind::Snapshot, id));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotCatalog for SurrealStore {
    async fn get_snapshot(&self, id: &str) -> StoreResult<Option<Snapshot>> {
        Ok(self.get_snapshot_record(id).await?)
    }

    async fn append_history(&self, id: &str, entries: &[AuditEntry]) -> StoreResult<()> {
        Ok(self.append_snapshot_history(id, entries).await?)
    }
}
