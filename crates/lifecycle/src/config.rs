//! Lifecycle configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use snaprestore_core::Error;

/// Longest accepted expiration window, one hundred years.
pub const MAX_EXPIRATION_DAYS: u32 = 36_500;

/// Settings for the orchestrator and completion handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Root under which per-restoration working directories live.
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Addresses that receive every completion notice.
    #[serde(default)]
    pub operational_recipients: Vec<String>,

    /// Days restored content stays at the destination after completion.
    #[serde(default = "default_expiration_days")]
    pub restoration_expiration_days: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            operational_recipients: Vec::new(),
            restoration_expiration_days: default_expiration_days(),
        }
    }
}

impl LifecycleConfig {
    /// Create a config rooted at `content_root` with default settings.
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            ..Self::default()
        }
    }

    /// Set the operational recipients.
    #[must_use]
    pub fn with_operational_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operational_recipients = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expiration window.
    #[must_use]
    pub const fn with_expiration_days(mut self, days: u32) -> Self {
        self.restoration_expiration_days = days;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the content root is empty, a
    /// recipient is not an address, or the expiration window is zero or
    /// longer than [`MAX_EXPIRATION_DAYS`].
    pub fn validate(&self) -> Result<(), Error> {
        if self.content_root.as_os_str().is_empty() {
            return Err(Error::invalid_config("content_root must not be empty"));
        }

        if let Some(bad) = self
            .operational_recipients
            .iter()
            .find(|r| !is_address(r))
        {
            return Err(Error::invalid_config(format!(
                "operational recipient '{bad}' is not an email address"
            )));
        }

        if self.restoration_expiration_days == 0 {
            return Err(Error::invalid_config(
                "restoration_expiration_days must be greater than 0",
            ));
        }

        if self.restoration_expiration_days > MAX_EXPIRATION_DAYS {
            return Err(Error::invalid_config(format!(
                "restoration_expiration_days must be at most {MAX_EXPIRATION_DAYS}"
            )));
        }

        Ok(())
    }
}

/// Loose address check: non-empty local part and domain around one `@`.
pub(crate) fn is_address(candidate: &str) -> bool {
    candidate
        .trim()
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        })
}

fn default_content_root() -> PathBuf {
    PathBuf::from("/var/lib/snaprestore/content")
}

const fn default_expiration_days() -> u32 {
    14
}
