//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the storage layer
//! and a handles struct for accessing all storage facades.

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::storage::db::PgPool;
use crate::storage::schema::provision;
use crate::storage::types::{Query, ReadResponse, Sample};
use crate::storage::{RemoteStorage, SampleReader, SampleWriter, StorageError};

/// Builder for constructing the storage layer.
pub struct StorageBuilder {
    config: DatabaseConfig,
    provision: bool,
}

impl StorageBuilder {
    /// Create a new storage builder.
    ///
    /// Provisioning is enabled by default.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            provision: true,
        }
    }

    /// Enable or disable extension/table provisioning on build.
    pub fn provision(mut self, enabled: bool) -> Self {
        self.provision = enabled;
        self
    }

    /// Connect, provision, and return handles.
    ///
    /// # Errors
    /// [`StorageError::Connection`] if the store is unreachable,
    /// [`StorageError::Provisioning`] if provisioning fails.
    pub async fn build(self) -> Result<StorageHandles, StorageError> {
        let pool = PgPool::connect(&self.config).await?;
        self.build_with_pool(pool).await
    }

    /// Build on top of an existing pool.
    pub async fn build_with_pool(self, pool: PgPool) -> Result<StorageHandles, StorageError> {
        if self.provision {
            let outcome = provision(&pool, &self.config).await?;
            tracing::debug!(?outcome, "Provisioning finished");
        }

        Ok(StorageHandles {
            writer: SampleWriter::new(pool.clone(), &self.config.table),
            reader: SampleReader::new(pool.clone(), &self.config.table),
            pool,
        })
    }
}

/// Handles to all storage layer facades.
#[derive(Debug, Clone)]
pub struct StorageHandles {
    /// Bulk writer for remote write batches.
    pub writer: SampleWriter,
    /// Query executor for remote read requests.
    pub reader: SampleReader,
    /// Shared connection pool.
    pool: PgPool,
}

impl StorageHandles {
    /// Check store availability.
    pub async fn health_check(&self) -> Result<(), StorageError> {
        self.pool.health_check().await
    }

    /// Gracefully shutdown the storage layer by closing the pool.
    pub async fn shutdown(self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl RemoteStorage for StorageHandles {
    async fn write(&self, samples: &[Sample]) -> Result<(), StorageError> {
        self.writer.write(samples).await
    }

    async fn read(&self, queries: &[Query]) -> Result<ReadResponse, StorageError> {
        self.reader.read(queries).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        StorageHandles::health_check(self).await
    }
}
