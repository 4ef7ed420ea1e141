//! Notification dispatch.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use thiserror::Error;
use tracing::{info, warn};

use snaprestore_core::BestEffort;

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Email,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "EMAIL"),
        }
    }
}

/// Errors reported by a notification transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport could not deliver the message.
    #[error("{kind} delivery failed: {reason}")]
    DeliveryFailed {
        kind: NotificationType,
        reason: String,
    },
}

/// Sends a message to a set of recipients.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Send one message.
    async fn send(
        &self,
        kind: NotificationType,
        subject: &str,
        body: &str,
        recipients: &BTreeSet<String>,
    ) -> Result<(), NotifyError>;
}

/// Transport that writes each message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

#[async_trait]
impl NotificationTransport for TracingTransport {
    async fn send(
        &self,
        kind: NotificationType,
        subject: &str,
        body: &str,
        recipients: &BTreeSet<String>,
    ) -> Result<(), NotifyError> {
        info!(
            kind = %kind,
            recipients = %recipients.iter().join(", "),
            subject,
            body,
            "Notification"
        );
        Ok(())
    }
}

/// Emits notifications without ever failing the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationDispatcher {
    /// Create a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    /// Send an email to `recipients`, returning whether it went out.
    ///
    /// An empty recipient set is skipped. Transport failures are logged.
    pub async fn notify(&self, subject: &str, body: &str, recipients: &BTreeSet<String>) -> bool {
        if recipients.is_empty() {
            warn!(subject, "No recipients for notification, skipping send");
            return false;
        }

        self.transport
            .send(NotificationType::Email, subject, body, recipients)
            .await
            .succeeded("send notification")
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}
