//! Snapshot lookup and history mirroring.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{EntityKind, StoreError, StoreResult};
use crate::history::{AuditEntry, HistoryTrail};
use crate::types::Snapshot;

/// Read access to snapshots plus their audit history.
#[async_trait]
pub trait SnapshotCatalog: Send + Sync {
    /// Look up a snapshot by id.
    async fn get_snapshot(&self, id: &str) -> StoreResult<Option<Snapshot>>;

    /// Append entries to a snapshot's history, in order.
    async fn append_history(&self, id: &str, entries: &[AuditEntry]) -> StoreResult<()>;
}

/// In-memory snapshot catalog.
#[derive(Debug, Default)]
pub struct InMemorySnapshotCatalog {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl InMemorySnapshotCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a snapshot.
    pub async fn register(&self, snapshot: Snapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.id.clone(), snapshot);
    }

    /// History recorded against a snapshot.
    pub async fn history(&self, id: &str) -> Option<HistoryTrail> {
        self.snapshots
            .read()
            .await
            .get(id)
            .map(|s| s.history.clone())
    }
}

#[async_trait]
impl SnapshotCatalog for InMemorySnapshotCatalog {
    async fn get_snapshot(&self, id: &str) -> StoreResult<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(id).cloned())
    }

    async fn append_history(&self, id: &str, entries: &[AuditEntry]) -> StoreResult<()> {
        self.snapshots
            .write()
            .await
            .get_mut(id)
            .map(|snapshot| snapshot.history.extend(entries.iter().cloned()))
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Snapshot,
                id: id.to_string(),
            })
    }
}
