//! SurrealDB persistence for snapshot restores.
//!
//! [`SurrealStore`] implements both
//! [`RestoreStore`](snaprestore_lifecycle::RestoreStore) (table
//! `restoration`) and [`SnapshotCatalog`](snaprestore_lifecycle::SnapshotCatalog)
//! (table `snapshot`). Connect with `mem://` for tests or `rocksdb://<path>`
//! for an embedded on-disk database.

pub mod client;
pub mod error;
pub mod restoration_store;
pub mod snapshot_catalog;

pub use client::{Credentials, StoreConfig, SurrealStore};
pub use error::{PersistenceError, PersistenceResult};
pub use restoration_store::RestorationRecord;
pub use snapshot_catalog::SnapshotRecord;
