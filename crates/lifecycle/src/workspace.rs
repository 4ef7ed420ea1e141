//! Transient working directory resolution and cleanup.
//!
//! Each restoration stages content under
//! `<content_root>/restorations/<restoration_id>`. The directory is removed
//! once the restore completes; removal is attempted once and a failure is
//! reported to the caller, which logs it and moves on.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::RestorationId;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while removing a working directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CleanupError {
    /// The path exists but is not a directory.
    #[error("working path {0} is not a directory")]
    NotADirectory(PathBuf),

    /// The filesystem refused the removal.
    #[error("failed to remove {path}: {reason}")]
    RemoveFailed { path: PathBuf, reason: String },
}

pub type CleanupResult<T> = Result<T, CleanupError>;

/// What a cleanup attempt found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The directory existed and was removed.
    Removed,
    /// There was nothing to remove.
    AlreadyAbsent,
}

// ============================================================================
// Path resolution
// ============================================================================

/// Working directory of a restoration under `content_root`.
#[must_use]
pub fn resolve_working_path(id: &RestorationId, content_root: &Path) -> PathBuf {
    content_root.join("restorations").join(id.as_str())
}

// ============================================================================
// Cleaners
// ============================================================================

/// Removes a restoration's working directory.
#[async_trait]
pub trait WorkspaceCleaner: Send + Sync {
    /// Remove `path` and everything beneath it.
    async fn remove(&self, path: &Path) -> CleanupResult<CleanupOutcome>;
}

/// Cleaner backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWorkspaceCleaner;

impl FsWorkspaceCleaner {
    /// Create a filesystem cleaner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkspaceCleaner for FsWorkspaceCleaner {
    async fn remove(&self, path: &Path) -> CleanupResult<CleanupOutcome> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(CleanupError::NotADirectory(path.to_path_buf()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Working directory already absent");
                return Ok(CleanupOutcome::AlreadyAbsent);
            }
            Err(e) => {
                return Err(CleanupError::RemoveFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }

        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed working directory");
                Ok(CleanupOutcome::Removed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CleanupOutcome::AlreadyAbsent),
            Err(e) => Err(CleanupError::RemoveFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}
