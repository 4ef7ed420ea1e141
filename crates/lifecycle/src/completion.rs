//! Consumption of transfer job outcomes.
//!
//! The external job runner reports each restoration's terminal outcome at
//! least once. [`RestoreCompletionHandler`] records it through the
//! orchestrator and, only for the delivery that actually changed the
//! status, removes the working directory and sends the notice. Status is
//! saved before either side effect runs.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LifecycleConfig;
use crate::error::{RestoreError, Result};
use crate::notify::NotificationDispatcher;
use crate::orchestrator::{RestoreOrchestrator, Settlement};
use crate::types::{Restoration, RestorationId, RestoreStatus};
use crate::workspace::{CleanupOutcome, WorkspaceCleaner, resolve_working_path};

/// Terminal outcome reported by a transfer job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    /// Restoration the job ran for.
    pub restoration_id: RestorationId,
    /// Whether every byte was transferred.
    pub succeeded: bool,
    /// Free-text detail from the job runner.
    #[serde(default)]
    pub detail: String,
}

impl JobOutcome {
    /// A successful outcome.
    pub fn success(restoration_id: RestorationId, detail: impl Into<String>) -> Self {
        Self {
            restoration_id,
            succeeded: true,
            detail: detail.into(),
        }
    }

    /// A failed outcome.
    pub fn failure(restoration_id: RestorationId, detail: impl Into<String>) -> Self {
        Self {
            restoration_id,
            succeeded: false,
            detail: detail.into(),
        }
    }

    /// Terminal status this outcome settles into.
    #[must_use]
    pub const fn target_status(&self) -> RestoreStatus {
        if self.succeeded {
            RestoreStatus::RestorationComplete
        } else {
            RestoreStatus::Error
        }
    }
}

/// What handling an outcome did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeDisposition {
    /// The restoration was marked complete.
    Completed,
    /// The restoration was marked failed.
    Failed,
    /// The outcome had already been recorded; nothing ran.
    Duplicate,
}

/// Drives a restoration to its terminal status when its job finishes.
pub struct RestoreCompletionHandler {
    orchestrator: Arc<RestoreOrchestrator>,
    dispatcher: NotificationDispatcher,
    cleaner: Arc<dyn WorkspaceCleaner>,
    content_root: PathBuf,
    operational_recipients: BTreeSet<String>,
}

impl RestoreCompletionHandler {
    /// Create a handler with its collaborators.
    pub fn new(
        orchestrator: Arc<RestoreOrchestrator>,
        dispatcher: NotificationDispatcher,
        cleaner: Arc<dyn WorkspaceCleaner>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher,
            cleaner,
            content_root: config.content_root.clone(),
            operational_recipients: config
                .operational_recipients
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    /// Record a job outcome and run its side effects once.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the restoration does not exist
    /// - `InvalidStateTransition` if the outcome does not fit the current
    ///   status (e.g. success before the transfer completed)
    /// - `ConcurrentModification` / `Persistence` if the status could not
    ///   be saved; the job runner should redeliver
    ///
    /// Cleanup and notification failures are logged, never returned.
    pub async fn handle_job_outcome(&self, outcome: &JobOutcome) -> Result<OutcomeDisposition> {
        let id = &outcome.restoration_id;
        let target = outcome.target_status();
        let status_text = if outcome.succeeded {
            format!("Completed transfer: {}", Utc::now().to_rfc3339())
        } else {
            format!("Failed to transfer: {}", Utc::now().to_rfc3339())
        };

        let settled = self
            .orchestrator
            .settle(id, target, &status_text)
            .await
            .map_err(|e| log_outcome_error(id, target, e))?;

        let restoration = match settled {
            Settlement::AlreadySettled(r) => {
                debug!(
                    restoration_id = %r.id,
                    status = %r.status,
                    "Duplicate job outcome ignored"
                );
                return Ok(OutcomeDisposition::Duplicate);
            }
            Settlement::Applied(r) => r,
        };

        let working_path = resolve_working_path(&restoration.id, &self.content_root);

        if outcome.succeeded {
            self.remove_working_directory(&restoration.id, &working_path)
                .await;
            self.dispatcher
                .notify(
                    &success_subject(&restoration),
                    &success_body(&restoration),
                    &self.success_recipients(&restoration),
                )
                .await;
            Ok(OutcomeDisposition::Completed)
        } else {
            self.dispatcher
                .notify(
                    &failure_subject(&restoration),
                    &failure_body(&restoration, &working_path, &outcome.detail),
                    self.failure_recipients(),
                )
                .await;
            Ok(OutcomeDisposition::Failed)
        }
    }

    /// Operational recipients plus the requester.
    #[must_use]
    pub fn success_recipients(&self, restoration: &Restoration) -> BTreeSet<String> {
        let mut recipients = self.operational_recipients.clone();
        let requester = restoration.user_email.trim();
        if !requester.is_empty() {
            recipients.insert(requester.to_string());
        }
        recipients
    }

    /// Operational recipients only.
    #[must_use]
    pub const fn failure_recipients(&self) -> &BTreeSet<String> {
        &self.operational_recipients
    }

    async fn remove_working_directory(&self, id: &RestorationId, path: &Path) {
        info!(
            restoration_id = %id,
            path = %path.display(),
            "Deleting restoration working directory"
        );
        match self.cleaner.remove(path).await {
            Ok(CleanupOutcome::Removed | CleanupOutcome::AlreadyAbsent) => {}
            Err(e) => error!(
                restoration_id = %id,
                path = %path.display(),
                error = %e,
                "Failed to delete restoration working directory"
            ),
        }
    }
}

impl fmt::Debug for RestoreCompletionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreCompletionHandler")
            .field("content_root", &self.content_root)
            .field("operational_recipients", &self.operational_recipients)
            .finish_non_exhaustive()
    }
}

fn log_outcome_error(id: &RestorationId, target: RestoreStatus, e: RestoreError) -> RestoreError {
    match &e {
        RestoreError::NotFound { .. } => {
            error!(restoration_id = %id, error = %e, "Job outcome for unknown restoration");
        }
        RestoreError::InvalidStateTransition { .. } => {
            error!(
                restoration_id = %id,
                status = %target,
                error = %e,
                "Job outcome does not fit restoration state"
            );
        }
        _ => {
            error!(
                restoration_id = %id,
                status = %target,
                error = %e,
                retryable = e.is_retryable(),
                "Failed to record job outcome"
            );
        }
    }
    e
}

/// Subject of the success notice.
#[must_use]
pub fn success_subject(restoration: &Restoration) -> String {
    format!(
        "Snapshot {} has been restored! Restore ID = {}",
        restoration.snapshot_id, restoration.id
    )
}

/// Body of the success notice.
#[must_use]
pub fn success_body(restoration: &Restoration) -> String {
    let destination = &restoration.destination;
    format!(
        "A snapshot restore has completed successfully:\n\n\
         SnapshotId: {}\n\
         Restore Id: {}\n\
         Destination Host: {}\n\
         Destination Port: {}\n\
         Destination StoreId: {}\n\
         Destination SpaceId: {}\n",
        restoration.snapshot_id,
        restoration.id,
        destination.host,
        destination.port,
        destination.store_id,
        destination.space_id,
    )
}

/// Subject of the failure notice.
#[must_use]
pub fn failure_subject(restoration: &Restoration) -> String {
    format!(
        "Snapshot {} restoration failed to complete",
        restoration.snapshot_id
    )
}

/// Body of the failure notice.
#[must_use]
pub fn failure_body(restoration: &Restoration, working_path: &Path, detail: &str) -> String {
    format!(
        "A snapshot restoration has failed to complete.\n\n\
         restore-id={}\n\
         snapshot-id={}\n\
         restore-path={}\n\
         detail={}\n",
        restoration.id,
        restoration.snapshot_id,
        working_path.display(),
        detail,
    )
}
