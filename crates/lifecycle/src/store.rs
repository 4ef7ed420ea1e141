//! Durable storage contract for restorations.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::types::{Restoration, RestorationId};

/// Trait for restoration storage backends.
///
/// `save` is a compare-and-swap on `version`: a record at version 1 must
/// not exist yet, and a record at version `n > 1` must currently be stored
/// at `n - 1`. Anything else is `StoreError::VersionConflict`.
#[async_trait]
pub trait RestoreStore: Send + Sync {
    /// Persist a restoration, returning the stored record.
    async fn save(&self, restoration: &Restoration) -> StoreResult<Restoration>;

    /// Load a restoration by id.
    async fn find_by_id(&self, id: &RestorationId) -> StoreResult<Option<Restoration>>;

    /// Load the most recently started restoration of a snapshot.
    async fn find_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Option<Restoration>>;

    /// Load every restoration of a snapshot, oldest first.
    async fn list_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Vec<Restoration>>;
}

/// Version the store must currently hold for `restoration` to be written.
///
/// `None` means the record must not exist.
#[must_use]
pub fn expected_stored_version(restoration: &Restoration) -> Option<u64> {
    restoration.version.checked_sub(1).filter(|v| *v > 0)
}

/// In-memory store for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryRestoreStore {
    restorations: RwLock<HashMap<RestorationId, Restoration>>,
}

impl InMemoryRestoreStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RestoreStore for InMemoryRestoreStore {
    async fn save(&self, restoration: &Restoration) -> StoreResult<Restoration> {
        let mut restorations = self.restorations.write().await;
        let found = restorations.get(&restoration.id).map(|r| r.version);
        let expected = expected_stored_version(restoration);

        if found != expected {
            return Err(StoreError::VersionConflict {
                restoration_id: restoration.id.to_string(),
                expected: expected.unwrap_or(0),
                found,
            });
        }

        restorations.insert(restoration.id.clone(), restoration.clone());
        Ok(restoration.clone())
    }

    async fn find_by_id(&self, id: &RestorationId) -> StoreResult<Option<Restoration>> {
        Ok(self.restorations.read().await.get(id).cloned())
    }

    async fn find_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Option<Restoration>> {
        Ok(self
            .restorations
            .read()
            .await
            .values()
            .filter(|r| r.snapshot_id == snapshot_id)
            .max_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)))
            .cloned())
    }

    async fn list_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Vec<Restoration>> {
        let mut matching: Vec<Restoration> = self
            .restorations
            .read()
            .await
            .values()
            .filter(|r| r.snapshot_id == snapshot_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Destination, RestoreStatus};

    fn restoration(id: &str) -> Restoration {
        Restoration::new(
            RestorationId::parse(id).unwrap_or_else(|_| RestorationId::generate()),
            "snapshot",
            Destination::new("host", 443, "store-id", "space-id"),
            "user-email",
            RestoreStatus::Requested,
            "Restoration requested",
        )
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = InMemoryRestoreStore::new();
        let record = restoration("r1");

        assert!(store.save(&record).await.is_ok());

        let loaded = store.find_by_id(&record.id).await.ok().flatten();
        assert_eq!(loaded.map(|r| r.snapshot_id), Some("snapshot".to_string()));
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let store = InMemoryRestoreStore::new();
        let record = restoration("r1");

        assert!(store.save(&record).await.is_ok());
        let second = store.save(&record).await;
        assert!(matches!(
            second,
            Err(StoreError::VersionConflict { found: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemoryRestoreStore::new();
        let mut record = restoration("r1");
        assert!(store.save(&record).await.is_ok());

        record.version = 2;
        assert!(store.save(&record).await.is_ok());

        // Another writer based on version 1.
        let mut stale = record.clone();
        stale.version = 2;
        assert!(store.save(&stale).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_snapshot_prefers_latest_start() {
        let store = InMemoryRestoreStore::new();
        let mut older = restoration("r1");
        older.start_date = older
            .start_date
            .checked_sub_signed(chrono::Duration::hours(1))
            .unwrap_or(older.start_date);
        let newer = restoration("r2");

        assert!(store.save(&older).await.is_ok());
        assert!(store.save(&newer).await.is_ok());

        let latest = store.find_by_snapshot_id("snapshot").await.ok().flatten();
        assert_eq!(latest.map(|r| r.id.to_string()), Some("r2".to_string()));

        let all = store.list_by_snapshot_id("snapshot").await.unwrap_or_default();
        assert_eq!(all.len(), 2);
        assert!(store.find_by_snapshot_id("other").await.ok().flatten().is_none());
    }

    #[test]
    fn test_expected_stored_version() {
        let mut record = restoration("r1");
        assert_eq!(expected_stored_version(&record), None);
        record.version = 4;
        assert_eq!(expected_stored_version(&record), Some(3));
    }
}
