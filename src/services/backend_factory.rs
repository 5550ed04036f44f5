//! Backend factory for link store initialization.
//!
//! ```text
//! BackendFactory
//!   ├── create_link_store(&StorageConfig) → Arc<dyn LinkStore>
//!   └── create_service(&DiscoveryConfig)  → DiscoveryService
//! ```

use std::sync::Arc;

use crate::config::{DiscoveryConfig, StorageBackendType, StorageConfig};
use crate::services::DiscoveryService;
use crate::storage::{LinkStore, SqliteLinkStore};
use crate::{Error, Result};

/// Factory for creating link stores from configuration.
pub struct BackendFactory;

impl BackendFactory {
    /// Opens the configured link store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the PostgreSQL backend is selected
    /// without a URL or without the `postgres` feature, and
    /// [`Error::OperationFailed`] if the store cannot be opened.
    pub fn create_link_store(config: &StorageConfig) -> Result<Arc<dyn LinkStore>> {
        match config.backend {
            StorageBackendType::Sqlite => {
                let path = config.sqlite_path();
                tracing::debug!(path = %path.display(), "Opening SQLite link store");
                Ok(Arc::new(SqliteLinkStore::new(path)?))
            },
            StorageBackendType::Postgres => Self::create_postgres(config),
        }
    }

    #[cfg(feature = "postgres")]
    fn create_postgres(config: &StorageConfig) -> Result<Arc<dyn LinkStore>> {
        let url = config.url.as_deref().ok_or_else(|| {
            Error::InvalidInput("storage.url is required for the postgres backend".to_string())
        })?;
        tracing::debug!("Opening PostgreSQL link store");
        Ok(Arc::new(crate::storage::PostgresLinkStore::with_pool_size(
            url,
            config.pool_max_size,
        )?))
    }

    #[cfg(not(feature = "postgres"))]
    fn create_postgres(_config: &StorageConfig) -> Result<Arc<dyn LinkStore>> {
        Err(Error::InvalidInput(
            "the postgres backend requires building with the 'postgres' feature".to_string(),
        ))
    }

    /// Opens the configured store and wraps it in a [`DiscoveryService`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent or the store
    /// cannot be opened.
    pub fn create_service(config: &DiscoveryConfig) -> Result<DiscoveryService> {
        config.validate()?;
        let store = Self::create_link_store(&config.storage)?;
        Ok(DiscoveryService::new(store, config.lookup))
    }
}
