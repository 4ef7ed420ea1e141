//! Core types for the restore lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::RestoreError;
use crate::history::HistoryTrail;

/// Unique identifier for a restoration.
///
/// Ids become a path component of the restoration's working directory, so
/// only ASCII alphanumerics, `-`, `_` and `.` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RestorationId(String);

impl RestorationId {
    /// Generate a fresh ULID-based id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Parse an externally supplied id.
    ///
    /// # Errors
    ///
    /// Returns `RestoreError::InvalidRequest` if the id is empty, is `.` or
    /// `..`, or contains characters outside `[A-Za-z0-9._-]`.
    pub fn parse(raw: &str) -> Result<Self, RestoreError> {
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if raw.is_empty() || raw == "." || raw == ".." || !valid_chars {
            return Err(RestoreError::invalid_request(format!(
                "invalid restoration id '{raw}'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RestorationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RestorationId {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RestorationId {
    type Error = RestoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RestorationId> for String {
    fn from(id: RestorationId) -> Self {
        id.0
    }
}

/// Endpoint a snapshot is restored into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Host of the storage endpoint.
    pub host: String,
    /// Port of the storage endpoint.
    pub port: u16,
    /// Storage provider identifier on the endpoint.
    pub store_id: String,
    /// Space (bucket) receiving the restored content.
    pub space_id: String,
}

impl Destination {
    /// Create a destination descriptor.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        store_id: impl Into<String>,
        space_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            store_id: store_id.into(),
            space_id: space_id.into(),
        }
    }

    /// Check the descriptor is usable as a restore target.
    ///
    /// # Errors
    ///
    /// Returns `RestoreError::InvalidRequest` naming the first missing part.
    pub fn validate(&self) -> Result<(), RestoreError> {
        if self.host.trim().is_empty() {
            return Err(RestoreError::invalid_request("destination host is empty"));
        }
        if self.port == 0 {
            return Err(RestoreError::invalid_request("destination port is 0"));
        }
        if self.space_id.trim().is_empty() {
            return Err(RestoreError::invalid_request("destination space id is empty"));
        }
        Ok(())
    }
}

/// Status of a restoration.
///
/// Progress is a total order; the only way off the happy path is `Error`,
/// and both `RestorationComplete` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreStatus {
    /// Restore has been asked for but not begun.
    Requested,
    /// Restore has begun; the transfer job is being provisioned.
    Initialized,
    /// The external transfer job is moving content.
    TransferInProgress,
    /// The external transfer job has moved all content.
    TransferComplete,
    /// Restored content is in place at the destination.
    RestorationComplete,
    /// The restore was aborted or failed.
    Error,
}

impl RestoreStatus {
    /// Every status, in order of progress.
    pub const ALL: [Self; 6] = [
        Self::Requested,
        Self::Initialized,
        Self::TransferInProgress,
        Self::TransferComplete,
        Self::RestorationComplete,
        Self::Error,
    ];

    /// Check if no further transition is accepted from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RestorationComplete | Self::Error)
    }

    /// Check if the restoration can move from this status to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Requested, Self::Initialized)
                | (Self::Initialized, Self::TransferInProgress)
                | (Self::TransferInProgress, Self::TransferComplete)
                | (Self::TransferComplete, Self::RestorationComplete)
                | (
                    Self::Requested
                        | Self::Initialized
                        | Self::TransferInProgress
                        | Self::TransferComplete,
                    Self::Error
                )
        )
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Initialized => "INITIALIZED",
            Self::TransferInProgress => "TRANSFER_IN_PROGRESS",
            Self::TransferComplete => "TRANSFER_COMPLETE",
            Self::RestorationComplete => "RESTORATION_COMPLETE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestoreStatus {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| RestoreError::invalid_request(format!("unknown restore status '{s}'")))
    }
}

/// One restore of a snapshot into a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restoration {
    /// Unique restoration identifier.
    pub id: RestorationId,
    /// Snapshot being restored.
    pub snapshot_id: String,
    /// Where restored content is written.
    pub destination: Destination,
    /// Current status.
    pub status: RestoreStatus,
    /// Free-text explanation of the current status.
    pub status_text: String,
    /// Address of the user who asked for the restore.
    pub user_email: String,
    /// When the restoration was created.
    pub start_date: DateTime<Utc>,
    /// When a terminal status was reached.
    pub end_date: Option<DateTime<Utc>>,
    /// When restored content is scheduled to be removed from the destination.
    pub expiration_date: Option<DateTime<Utc>>,
    /// Audit entries, in append order.
    pub history: HistoryTrail,
    /// Optimistic concurrency counter, bumped on every persisted change.
    pub version: u64,
}

impl Restoration {
    /// Create a new, unsaved restoration at version 1.
    pub fn new(
        id: RestorationId,
        snapshot_id: impl Into<String>,
        destination: Destination,
        user_email: impl Into<String>,
        status: RestoreStatus,
        status_text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            snapshot_id: snapshot_id.into(),
            destination,
            status,
            status_text: status_text.into(),
            user_email: user_email.into(),
            start_date: Utc::now(),
            end_date: None,
            expiration_date: None,
            history: HistoryTrail::new(),
            version: 1,
        }
    }

    /// Check if the restoration still counts against its snapshot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Archive state of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    /// Snapshot has been registered but archiving has not begun.
    Pending,
    /// Content is being archived.
    Archiving,
    /// Content is fully archived and can be restored.
    SnapshotComplete,
    /// Archiving failed.
    Failed,
}

impl SnapshotStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Archiving => "ARCHIVING",
            Self::SnapshotComplete => "SNAPSHOT_COMPLETE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotStatus {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        [
            Self::Pending,
            Self::Archiving,
            Self::SnapshotComplete,
            Self::Failed,
        ]
        .into_iter()
        .find(|status| status.as_str() == normalized)
        .ok_or_else(|| RestoreError::invalid_request(format!("unknown snapshot status '{s}'")))
    }
}

/// An archived content set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique snapshot name.
    pub id: String,
    /// Optional human description.
    pub description: Option<String>,
    /// Archive state.
    pub status: SnapshotStatus,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Audit entries recorded against the snapshot.
    pub history: HistoryTrail,
}

impl Snapshot {
    /// Create a snapshot record with an empty history.
    pub fn new(id: impl Into<String>, status: SnapshotStatus) -> Self {
        Self {
            id: id.into(),
            description: None,
            status,
            created_at: Utc::now(),
            history: HistoryTrail::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check if the snapshot can be restored.
    #[must_use]
    pub const fn is_restorable(&self) -> bool {
        matches!(self.status, SnapshotStatus::SnapshotComplete)
    }
}
