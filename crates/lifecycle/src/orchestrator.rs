//! Restore orchestrator: the single writer of restoration status.
//!
//! Creation paths (`request_restore`, `start_restore`) serialise on the
//! snapshot; status changes (`apply_transition`, `settle`) serialise on the
//! restoration. When both are needed the snapshot lock is taken first.
//! The store's version check catches writers outside this process.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use snaprestore_core::ResultTap;

use crate::config::{LifecycleConfig, MAX_EXPIRATION_DAYS};
use crate::error::{EntityKind, RestoreError, Result};
use crate::history::{AuditEntry, RestoreAction};
use crate::lock::{KeyedLocks, restoration_key, snapshot_key};
use crate::snapshot::SnapshotCatalog;
use crate::store::RestoreStore;
use crate::types::{Destination, Restoration, RestorationId, RestoreStatus, Snapshot};

/// Status text of a freshly requested restoration.
pub const REQUESTED_TEXT: &str = "Restoration requested";
/// Status text of a freshly started restoration.
pub const INITIALIZED_TEXT: &str = "Restoration initialized";

/// Source of ids for new restorations.
pub type IdSource = Arc<dyn Fn() -> RestorationId + Send + Sync>;

/// Result of settling a restoration into a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// This call moved the restoration into the terminal status.
    Applied(Restoration),
    /// The restoration was already in that terminal status.
    AlreadySettled(Restoration),
}

impl Settlement {
    /// The restoration as it now stands.
    #[must_use]
    pub const fn restoration(&self) -> &Restoration {
        match self {
            Self::Applied(r) | Self::AlreadySettled(r) => r,
        }
    }

    /// Consume into the restoration.
    #[must_use]
    pub fn into_restoration(self) -> Restoration {
        match self {
            Self::Applied(r) | Self::AlreadySettled(r) => r,
        }
    }
}

/// Owns the restore state machine.
pub struct RestoreOrchestrator {
    store: Arc<dyn RestoreStore>,
    snapshots: Arc<dyn SnapshotCatalog>,
    locks: KeyedLocks,
    expiration: Duration,
    next_id: IdSource,
}

impl RestoreOrchestrator {
    /// Create an orchestrator over the given store and snapshot catalog.
    pub fn new(
        store: Arc<dyn RestoreStore>,
        snapshots: Arc<dyn SnapshotCatalog>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            locks: KeyedLocks::new(),
            expiration: Duration::days(i64::from(
                config.restoration_expiration_days.min(MAX_EXPIRATION_DAYS),
            )),
            next_id: Arc::new(RestorationId::generate),
        }
    }

    /// Replace the id source used for new restorations.
    #[must_use]
    pub fn with_id_source(
        mut self,
        next_id: impl Fn() -> RestorationId + Send + Sync + 'static,
    ) -> Self {
        self.next_id = Arc::new(next_id);
        self
    }

    /// Record a request to restore `snapshot_id` into `destination`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the destination or email is unusable
    /// - `NotFound` / `SnapshotNotEligible` if the snapshot cannot be restored
    /// - `Conflict` if the snapshot already has an active restoration
    /// - `Persistence` if the store fails
    pub async fn request_restore(
        &self,
        snapshot_id: &str,
        destination: Destination,
        user_email: &str,
    ) -> Result<Restoration> {
        validate_request(&destination, user_email)?;

        let _snapshot_guard = self.locks.acquire(&snapshot_key(snapshot_id)).await;
        self.eligible_snapshot(snapshot_id).await?;

        if let Some(active) = self.active_restoration(snapshot_id).await? {
            return Err(conflict(&active));
        }

        let entries = vec![
            AuditEntry::restore_action(RestoreAction::Requested),
            AuditEntry::initiating_user(user_email),
        ];
        let mut restoration = Restoration::new(
            (self.next_id)(),
            snapshot_id,
            destination,
            user_email,
            RestoreStatus::Requested,
            REQUESTED_TEXT,
        );
        restoration.history.extend(entries.iter().cloned());

        let saved = self
            .store
            .save(&restoration)
            .await
            .map_err(|e| RestoreError::persistence("request_restore", e))?;

        info!(
            restoration_id = %saved.id,
            snapshot_id,
            status = %saved.status,
            "Restore requested"
        );

        self.mirror_history(snapshot_id, &entries).await;
        Ok(saved)
    }

    /// Start restoring `snapshot_id`.
    ///
    /// A requested restoration for the snapshot is advanced to
    /// `INITIALIZED`; with none, a new one is created directly in that
    /// state.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the destination or email is unusable, or the
    ///   destination differs from the one requested
    /// - `NotFound` / `SnapshotNotEligible` if the snapshot cannot be restored
    /// - `Conflict` if the snapshot has a restoration already under way
    /// - `Persistence` if the store fails
    pub async fn start_restore(
        &self,
        snapshot_id: &str,
        destination: Destination,
        user_email: &str,
    ) -> Result<Restoration> {
        validate_request(&destination, user_email)?;

        let _snapshot_guard = self.locks.acquire(&snapshot_key(snapshot_id)).await;
        self.eligible_snapshot(snapshot_id).await?;

        let started = match self.active_restoration(snapshot_id).await? {
            None => {
                let id = (self.next_id)();
                let mut restoration = Restoration::new(
                    id.clone(),
                    snapshot_id,
                    destination,
                    user_email,
                    RestoreStatus::Initialized,
                    INITIALIZED_TEXT,
                );
                restoration.history.extend(initiated_entries(&id, user_email));
                self.store
                    .save(&restoration)
                    .await
                    .map_err(|e| RestoreError::persistence("start_restore", e))?
            }
            Some(requested) if requested.status == RestoreStatus::Requested => {
                self.initialize_requested(&requested.id, &destination, user_email)
                    .await?
            }
            Some(active) => return Err(conflict(&active)),
        };

        info!(
            restoration_id = %started.id,
            snapshot_id,
            status = %started.status,
            "Restore started"
        );

        self.mirror_history(snapshot_id, &initiated_entries(&started.id, user_email))
            .await;
        Ok(started)
    }

    /// Look up a restoration by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, `Persistence` if the store fails.
    pub async fn get(&self, id: &RestorationId) -> Result<Restoration> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| RestoreError::persistence("get", e))?
            .ok_or_else(|| RestoreError::not_found(EntityKind::Restoration, id.as_str()))
    }

    /// Look up the most recently started restoration of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the snapshot has no restoration, `Persistence`
    /// if the store fails.
    pub async fn get_by_snapshot_id(&self, snapshot_id: &str) -> Result<Restoration> {
        self.store
            .find_by_snapshot_id(snapshot_id)
            .await
            .map_err(|e| RestoreError::persistence("get_by_snapshot_id", e))?
            .ok_or_else(|| {
                RestoreError::not_found(EntityKind::Restoration, format!("snapshot={snapshot_id}"))
            })
    }

    /// Move a restoration to `status`.
    ///
    /// Re-applying the current status with the same text changes nothing.
    /// Re-applying a non-terminal status with new text updates the text
    /// only.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the restoration does not exist
    /// - `InvalidStateTransition` if `status` is not reachable
    /// - `ConcurrentModification` / `Persistence` if the write fails
    pub async fn apply_transition(
        &self,
        id: &RestorationId,
        status: RestoreStatus,
        status_text: &str,
    ) -> Result<Restoration> {
        let _guard = self.locks.acquire(&restoration_key(id.as_str())).await;
        let current = self.get(id).await?;
        self.transition_locked(current, status, status_text).await
    }

    /// Move a restoration into a terminal status exactly once.
    ///
    /// A restoration already in `status` is reported as `AlreadySettled`
    /// whatever its text, so repeated deliveries of one outcome are
    /// recognised even when their text differs.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `status` is not terminal
    /// - `NotFound` if the restoration does not exist
    /// - `InvalidStateTransition` if `status` is not reachable
    /// - `ConcurrentModification` / `Persistence` if the write fails
    pub async fn settle(
        &self,
        id: &RestorationId,
        status: RestoreStatus,
        status_text: &str,
    ) -> Result<Settlement> {
        if !status.is_terminal() {
            return Err(RestoreError::invalid_request(format!(
                "{status} is not a terminal status"
            )));
        }

        let _guard = self.locks.acquire(&restoration_key(id.as_str())).await;
        let current = self.get(id).await?;

        if current.status == status {
            debug!(restoration_id = %id, status = %status, "Restoration already settled");
            return Ok(Settlement::AlreadySettled(current));
        }

        self.transition_locked(current, status, status_text)
            .await
            .map(Settlement::Applied)
    }

    async fn transition_locked(
        &self,
        current: Restoration,
        status: RestoreStatus,
        status_text: &str,
    ) -> Result<Restoration> {
        if current.status == status {
            if current.status_text == status_text {
                debug!(restoration_id = %current.id, status = %status, "Transition is a no-op");
                return Ok(current);
            }
            if status.is_terminal() {
                return Err(RestoreError::invalid_transition(
                    current.id.as_str(),
                    current.status,
                    status,
                ));
            }

            let mut next = current;
            next.status_text = status_text.to_string();
            next.version = next.version.saturating_add(1);
            return self.persist_transition(next).await;
        }

        if !current.status.can_transition_to(status) {
            return Err(RestoreError::invalid_transition(
                current.id.as_str(),
                current.status,
                status,
            ));
        }

        let from = current.status;
        let mut next = current;
        next.status = status;
        next.status_text = status_text.to_string();
        next.history.append(AuditEntry::restore_status(status));
        next.version = next.version.saturating_add(1);

        if status.is_terminal() {
            let ended = Utc::now();
            next.end_date = Some(ended);
            if status == RestoreStatus::RestorationComplete {
                next.expiration_date = self.expiration_after(ended);
            }
        }

        let saved = self.persist_transition(next).await?;
        info!(
            restoration_id = %saved.id,
            from = %from,
            status = %saved.status,
            "Restoration transitioned"
        );
        Ok(saved)
    }

    async fn persist_transition(&self, next: Restoration) -> Result<Restoration> {
        self.store
            .save(&next)
            .await
            .map_err(|e| RestoreError::persistence("apply_transition", e))
    }

    async fn initialize_requested(
        &self,
        id: &RestorationId,
        destination: &Destination,
        user_email: &str,
    ) -> Result<Restoration> {
        let _guard = self.locks.acquire(&restoration_key(id.as_str())).await;
        let current = self.get(id).await?;

        if current.status != RestoreStatus::Requested {
            return Err(RestoreError::invalid_transition(
                id.as_str(),
                current.status,
                RestoreStatus::Initialized,
            ));
        }
        if &current.destination != destination {
            return Err(RestoreError::invalid_request(format!(
                "restoration '{id}' was requested for a different destination"
            )));
        }

        let mut next = current;
        next.status = RestoreStatus::Initialized;
        next.status_text = INITIALIZED_TEXT.to_string();
        next.history.extend(initiated_entries(id, user_email));
        next.version = next.version.saturating_add(1);

        self.store
            .save(&next)
            .await
            .map_err(|e| RestoreError::persistence("start_restore", e))
    }

    async fn eligible_snapshot(&self, snapshot_id: &str) -> Result<Snapshot> {
        let snapshot = self
            .snapshots
            .get_snapshot(snapshot_id)
            .await
            .map_err(|e| RestoreError::persistence("get_snapshot", e))?
            .ok_or_else(|| RestoreError::not_found(EntityKind::Snapshot, snapshot_id))?;

        if !snapshot.is_restorable() {
            return Err(RestoreError::SnapshotNotEligible {
                snapshot_id: snapshot.id,
                status: snapshot.status,
            });
        }
        Ok(snapshot)
    }

    async fn active_restoration(&self, snapshot_id: &str) -> Result<Option<Restoration>> {
        Ok(self
            .store
            .list_by_snapshot_id(snapshot_id)
            .await
            .map_err(|e| RestoreError::persistence("list_by_snapshot_id", e))?
            .into_iter()
            .rev()
            .find(Restoration::is_active))
    }

    async fn mirror_history(&self, snapshot_id: &str, entries: &[AuditEntry]) {
        let _ = self
            .snapshots
            .append_history(snapshot_id, entries)
            .await
            .tap_err(|e| {
                error!(
                    snapshot_id,
                    error = %e,
                    "Failed to mirror restore history onto snapshot"
                );
            });
    }

    fn expiration_after(&self, ended: DateTime<Utc>) -> Option<DateTime<Utc>> {
        ended.checked_add_signed(self.expiration)
    }
}

impl fmt::Debug for RestoreOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreOrchestrator")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

fn validate_request(destination: &Destination, user_email: &str) -> Result<()> {
    destination.validate()?;
    if user_email.trim().is_empty() {
        return Err(RestoreError::invalid_request("user email is empty"));
    }
    Ok(())
}

fn initiated_entries(id: &RestorationId, user_email: &str) -> [AuditEntry; 3] {
    [
        AuditEntry::restore_action(RestoreAction::Initiated),
        AuditEntry::restore_id(id),
        AuditEntry::initiating_user(user_email),
    ]
}

fn conflict(active: &Restoration) -> RestoreError {
    RestoreError::Conflict {
        snapshot_id: active.snapshot_id.clone(),
        restoration_id: active.id.to_string(),
        status: active.status,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::arithmetic_side_effects)]

    use super::*;
    use crate::snapshot::InMemorySnapshotCatalog;
    use crate::store::InMemoryRestoreStore;
    use crate::types::SnapshotStatus;

    async fn orchestrator() -> RestoreOrchestrator {
        orchestrator_with(&LifecycleConfig::new("/tmp/content")).await
    }

    async fn orchestrator_with(config: &LifecycleConfig) -> RestoreOrchestrator {
        let catalog = Arc::new(InMemorySnapshotCatalog::new());
        catalog
            .register(Snapshot::new("snapshot", SnapshotStatus::SnapshotComplete))
            .await;
        catalog
            .register(Snapshot::new("archiving", SnapshotStatus::Archiving))
            .await;
        RestoreOrchestrator::new(
            Arc::new(InMemoryRestoreStore::new()),
            catalog,
            config,
        )
    }

    fn destination() -> Destination {
        Destination::new("host", 443, "store-id", "space-id")
    }

    #[tokio::test]
    async fn test_request_rejects_ineligible_snapshot() {
        let orchestrator = orchestrator().await;
        let result = orchestrator
            .request_restore("archiving", destination(), "user-email")
            .await;
        assert!(matches!(
            result,
            Err(RestoreError::SnapshotNotEligible {
                status: SnapshotStatus::Archiving,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_request_rejects_blank_email() {
        let orchestrator = orchestrator().await;
        let result = orchestrator
            .request_restore("snapshot", destination(), "  ")
            .await;
        assert!(matches!(result, Err(RestoreError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_text_only_update_bumps_version_without_history() {
        let orchestrator = orchestrator().await;
        let started = orchestrator
            .start_restore("snapshot", destination(), "user-email")
            .await
            .expect("start");

        let updated = orchestrator
            .apply_transition(&started.id, RestoreStatus::Initialized, "Provisioning job")
            .await
            .expect("text update");

        assert_eq!(updated.status_text, "Provisioning job");
        assert_eq!(updated.version, started.version.saturating_add(1));
        assert_eq!(updated.history.len(), started.history.len());
    }

    #[tokio::test]
    async fn test_expiration_set_on_completion_only() {
        let orchestrator = orchestrator().await;
        let started = orchestrator
            .start_restore("snapshot", destination(), "user-email")
            .await
            .expect("start");

        for status in [
            RestoreStatus::TransferInProgress,
            RestoreStatus::TransferComplete,
        ] {
            let step = orchestrator
                .apply_transition(&started.id, status, "step")
                .await
                .expect("step");
            assert!(step.expiration_date.is_none());
        }

        let done = orchestrator
            .apply_transition(&started.id, RestoreStatus::RestorationComplete, "done")
            .await
            .expect("complete");

        let ended = done.end_date.expect("end date");
        assert_eq!(done.expiration_date, Some(ended + Duration::days(14)));
    }

    #[tokio::test]
    async fn test_oversized_expiration_window_still_dates_completion() {
        let config = LifecycleConfig::new("/tmp/content").with_expiration_days(u32::MAX);
        let orchestrator = orchestrator_with(&config).await;
        let started = orchestrator
            .start_restore("snapshot", destination(), "user-email")
            .await
            .expect("start");
        for status in [
            RestoreStatus::TransferInProgress,
            RestoreStatus::TransferComplete,
            RestoreStatus::RestorationComplete,
        ] {
            orchestrator
                .apply_transition(&started.id, status, "step")
                .await
                .expect("step");
        }

        let done = orchestrator.get(&started.id).await.expect("reload");
        let ended = done.end_date.expect("end date");
        assert_eq!(
            done.expiration_date,
            Some(ended + Duration::days(i64::from(MAX_EXPIRATION_DAYS)))
        );
    }

    #[tokio::test]
    async fn test_settle_rejects_non_terminal_status() {
        let orchestrator = orchestrator().await;
        let started = orchestrator
            .start_restore("snapshot", destination(), "user-email")
            .await
            .expect("start");

        let result = orchestrator
            .settle(&started.id, RestoreStatus::TransferInProgress, "x")
            .await;
        assert!(matches!(result, Err(RestoreError::InvalidRequest { .. })));
    }
}
