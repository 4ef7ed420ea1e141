//! Shared fixture and test doubles for lifecycle integration tests.

#![allow(dead_code)]
#![allow(clippy::expect_used)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use snaprestore_lifecycle::workspace::CleanupResult;
use snaprestore_lifecycle::{
    CleanupError, CleanupOutcome, Destination, InMemoryRestoreStore, InMemorySnapshotCatalog,
    LifecycleConfig, NotificationDispatcher, NotificationTransport, NotificationType,
    NotifyError, Restoration, RestorationId, RestoreCompletionHandler, RestoreOrchestrator,
    RestoreStore, Snapshot, SnapshotStatus, StoreError, StoreResult, WorkspaceCleaner,
};

pub const SNAPSHOT_ID: &str = "snapshot";
pub const RESTORATION_ID: &str = "restoration-id";
pub const USER_EMAIL: &str = "user-email";
pub const OPS_EMAIL: &str = "ops@example.org";

pub fn destination() -> Destination {
    Destination::new("host", 443, "store-id", "space-id")
}

pub fn restoration_id() -> RestorationId {
    RestorationId::parse(RESTORATION_ID).expect("valid id")
}

/// Ids `restoration-id`, `restoration-id-2`, `restoration-id-3`, ...
pub fn sequential_ids() -> impl Fn() -> RestorationId + Send + Sync + 'static {
    let counter = AtomicUsize::new(0);
    move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let raw = if n == 0 {
            RESTORATION_ID.to_string()
        } else {
            format!("{RESTORATION_ID}-{}", n.saturating_add(1))
        };
        RestorationId::parse(&raw).expect("valid id")
    }
}

/// A notification as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub kind: NotificationType,
    pub subject: String,
    pub body: String,
    pub recipients: BTreeSet<String>,
}

/// Transport that records every send and can be told to fail.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentNotification>>,
    fail: AtomicBool,
}

impl RecordingTransport {
    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(
        &self,
        kind: NotificationType,
        subject: &str,
        body: &str,
        recipients: &BTreeSet<String>,
    ) -> Result<(), NotifyError> {
        self.sent.lock().await.push(SentNotification {
            kind,
            subject: subject.to_string(),
            body: body.to_string(),
            recipients: recipients.clone(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::DeliveryFailed {
                kind,
                reason: "mail relay unreachable".to_string(),
            });
        }
        Ok(())
    }
}

/// Cleaner that records every removal attempt and can be told to fail.
#[derive(Default)]
pub struct RecordingCleaner {
    removed: Mutex<Vec<PathBuf>>,
    fail: AtomicBool,
}

impl RecordingCleaner {
    pub fn fail_removals(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub async fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().await.clone()
    }
}

#[async_trait]
impl WorkspaceCleaner for RecordingCleaner {
    async fn remove(&self, path: &Path) -> CleanupResult<CleanupOutcome> {
        self.removed.lock().await.push(path.to_path_buf());
        if self.fail.load(Ordering::SeqCst) {
            return Err(CleanupError::RemoveFailed {
                path: path.to_path_buf(),
                reason: "device busy".to_string(),
            });
        }
        Ok(CleanupOutcome::Removed)
    }
}

/// Store wrapper whose saves can be switched off.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryRestoreStore,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestoreStore for FlakyStore {
    async fn save(&self, restoration: &Restoration) -> StoreResult<Restoration> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection reset"));
        }
        let saved = self.inner.save(restoration).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }

    async fn find_by_id(&self, id: &RestorationId) -> StoreResult<Option<Restoration>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Option<Restoration>> {
        self.inner.find_by_snapshot_id(snapshot_id).await
    }

    async fn list_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Vec<Restoration>> {
        self.inner.list_by_snapshot_id(snapshot_id).await
    }
}

/// Everything wired together over in-memory collaborators.
pub struct Fixture {
    pub store: Arc<FlakyStore>,
    pub catalog: Arc<InMemorySnapshotCatalog>,
    pub orchestrator: Arc<RestoreOrchestrator>,
    pub handler: Arc<RestoreCompletionHandler>,
    pub transport: Arc<RecordingTransport>,
    pub cleaner: Arc<RecordingCleaner>,
    pub config: LifecycleConfig,
}

impl Fixture {
    pub async fn new() -> Self {
        let config = LifecycleConfig::new("/var/lib/snaprestore/content")
            .with_operational_recipients([OPS_EMAIL]);

        let store = Arc::new(FlakyStore::default());
        let catalog = Arc::new(InMemorySnapshotCatalog::new());
        catalog
            .register(Snapshot::new(SNAPSHOT_ID, SnapshotStatus::SnapshotComplete))
            .await;

        let orchestrator = Arc::new(
            RestoreOrchestrator::new(store.clone(), catalog.clone(), &config)
                .with_id_source(sequential_ids()),
        );
        let transport = Arc::new(RecordingTransport::default());
        let cleaner = Arc::new(RecordingCleaner::default());
        let handler = Arc::new(RestoreCompletionHandler::new(
            orchestrator.clone(),
            NotificationDispatcher::new(transport.clone()),
            cleaner.clone(),
            &config,
        ));

        Self {
            store,
            catalog,
            orchestrator,
            handler,
            transport,
            cleaner,
            config,
        }
    }

    /// A restoration driven to `TRANSFER_COMPLETE`.
    pub async fn transfer_complete(&self) -> Restoration {
        use snaprestore_lifecycle::RestoreStatus;

        let started = self
            .orchestrator
            .start_restore(SNAPSHOT_ID, destination(), USER_EMAIL)
            .await
            .expect("start restore");
        self.orchestrator
            .apply_transition(&started.id, RestoreStatus::TransferInProgress, "Transferring")
            .await
            .expect("transfer in progress");
        self.orchestrator
            .apply_transition(&started.id, RestoreStatus::TransferComplete, "Transferred")
            .await
            .expect("transfer complete")
    }
}
