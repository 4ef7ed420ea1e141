//! Restore lifecycle for archived snapshots.
//!
//! A restoration moves through
//! `REQUESTED → INITIALIZED → TRANSFER_IN_PROGRESS → TRANSFER_COMPLETE →
//! RESTORATION_COMPLETE`, or to `ERROR` from any non-terminal status.
//!
//! - [`RestoreOrchestrator`]: creates restorations and is the only writer
//!   of their status
//! - [`RestoreCompletionHandler`]: records a transfer job's outcome and
//!   runs cleanup and notification exactly once
//! - [`HistoryTrail`]: the append-only audit log carried by restorations
//!   and snapshots
//! - [`RestoreStore`] / [`SnapshotCatalog`]: storage contracts, with
//!   in-memory implementations for tests and single-process use

pub mod completion;
pub mod config;
pub mod error;
pub mod history;
pub mod lock;
pub mod notify;
pub mod orchestrator;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod workspace;

pub use completion::{JobOutcome, OutcomeDisposition, RestoreCompletionHandler};
pub use config::{LifecycleConfig, MAX_EXPIRATION_DAYS};
pub use error::{EntityKind, RestoreError, Result, StoreError, StoreResult};
pub use history::{AuditEntry, HistoryTrail, RestoreAction};
pub use lock::KeyedLocks;
pub use notify::{
    NotificationDispatcher, NotificationTransport, NotificationType, NotifyError, TracingTransport,
};
pub use orchestrator::{RestoreOrchestrator, Settlement};
pub use snapshot::{InMemorySnapshotCatalog, SnapshotCatalog};
pub use store::{InMemoryRestoreStore, RestoreStore};
pub use types::{
    Destination, Restoration, RestorationId, RestoreStatus, Snapshot, SnapshotStatus,
};
pub use workspace::{
    CleanupError, CleanupOutcome, FsWorkspaceCleaner, WorkspaceCleaner, resolve_working_path,
};
