//! Operator configuration file.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use snaprestore_lifecycle::LifecycleConfig;
use snaprestore_store::StoreConfig;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "snaprestore.toml";

/// Full operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Lifecycle settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Database settings.
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load and validate the configuration.
    ///
    /// An explicit path must exist. Without one, `snaprestore.toml` in the
    /// working directory is used if present and defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the
    /// settings are invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => read(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    read(&default_path)?
                } else {
                    info!("No {DEFAULT_CONFIG_PATH} found, using default configuration");
                    Self::default()
                }
            }
        };

        config
            .lifecycle
            .validate()
            .context("Invalid [lifecycle] configuration")?;
        Ok(config)
    }
}

fn read(path: &Path) -> Result<AppConfig> {
    let config = snaprestore_core::load_toml(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snaprestore.toml");
        std::fs::write(
            &path,
            r#"
[lifecycle]
content_root = "/srv/content"
operational_recipients = ["ops@example.org"]
restoration_expiration_days = 30

[store]
url = "mem://"
namespace = "ns"
database = "db"
"#,
        )
        .expect("write config");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.lifecycle.content_root, PathBuf::from("/srv/content"));
        assert_eq!(config.lifecycle.restoration_expiration_days, 30);
        assert_eq!(config.store.url, "mem://");
        assert_eq!(config.store.namespace, "ns");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = AppConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_lifecycle_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snaprestore.toml");
        std::fs::write(&path, "[lifecycle]\nrestoration_expiration_days = 0\n")
            .expect("write config");

        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
