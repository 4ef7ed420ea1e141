//! SurrealDB client for restoration persistence.
//!
//! Provides connection management and schema setup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::{PersistenceResult, from_surrealdb_error};

/// Configuration for the restoration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL (e.g., "mem://", "rocksdb://path/to/db")
    #[serde(default = "default_url")]
    pub url: String,
    /// Namespace to use
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Database to use
    #[serde(default = "default_database")]
    pub database: String,
    /// Optional root credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

/// Root credentials for authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl StoreConfig {
    /// Create an in-memory configuration for testing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: default_namespace(),
            database: "test".to_string(),
            credentials: None,
        }
    }

    /// Create an embedded RocksDB configuration at `path`.
    #[must_use]
    pub fn rocksdb(path: &str) -> Self {
        Self {
            url: format!("rocksdb://{path}"),
            ..Self::default()
        }
    }

    /// Set credentials for authentication.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            namespace: default_namespace(),
            database: default_database(),
            credentials: None,
        }
    }
}

fn default_url() -> String {
    "rocksdb://.snaprestore/db".to_string()
}

fn default_namespace() -> String {
    "snaprestore".to_string()
}

fn default_database() -> String {
    "restorations".to_string()
}

/// Connection to the restoration database.
///
/// Implements [`RestoreStore`](snaprestore_lifecycle::RestoreStore) and
/// [`SnapshotCatalog`](snaprestore_lifecycle::SnapshotCatalog).
#[derive(Debug, Clone)]
pub struct SurrealStore {
    db: Arc<Surreal<Any>>,
}

impl SurrealStore {
    /// Connect to the database with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or authentication fails.
    pub async fn connect(config: &StoreConfig) -> PersistenceResult<Self> {
        let db = Surreal::<Any>::init();

        db.connect(config.url.as_str())
            .await
            .map_err(from_surrealdb_error)?;

        if let Some(creds) = &config.credentials {
            db.signin(Root {
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(from_surrealdb_error)?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(from_surrealdb_error)?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connected to restoration store"
        );

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a reference to the underlying database client.
    #[must_use]
    pub fn db(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Initialize the database schema.
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails.
    pub async fn initialize_schema(&self) -> PersistenceResult<()> {
        let schema = include_str!("schema.surql");

        self.db
            .query(schema)
            .await
            .map_err(from_surrealdb_error)?
            .check()
            .map_err(|e| crate::error::PersistenceError::schema_error(e.to_string()))?;

        Ok(())
    }

    /// Check if the database is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    pub async fn health_check(&self) -> PersistenceResult<()> {
        self.db
            .query("INFO FOR DB")
            .await
            .map_err(from_surrealdb_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_in_memory() {
        let config = StoreConfig::in_memory();
        assert_eq!(config.url, "mem://");
        assert_eq!(config.namespace, "snaprestore");
        assert_eq!(config.database, "test");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_store_config_rocksdb() {
        let config = StoreConfig::rocksdb("/var/lib/snaprestore/db");
        assert_eq!(config.url, "rocksdb:///var/lib/snaprestore/db");
        assert_eq!(config.database, "restorations");
    }

    #[test]
    fn test_store_config_with_credentials() {
        let config = StoreConfig::in_memory().with_credentials("root", "secret");

        assert!(config.credentials.is_some());
        if let Some(creds) = config.credentials {
            assert_eq!(creds.username, "root");
            assert_eq!(creds.password, "secret");
        }
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let store = SurrealStore::connect(&StoreConfig::in_memory()).await;
        assert!(store.is_ok(), "should connect to in-memory database");
    }

    #[tokio::test]
    async fn test_schema_and_health_check() {
        let Some(store) = SurrealStore::connect(&StoreConfig::in_memory()).await.ok() else {
            return;
        };

        let schema = store.initialize_schema().await;
        assert!(schema.is_ok(), "schema should apply: {:?}", schema.err());

        // Applying twice is harmless.
        assert!(store.initialize_schema().await.is_ok());

        let health = store.health_check().await;
        assert!(health.is_ok(), "health check should pass: {:?}", health.err());
    }
}
