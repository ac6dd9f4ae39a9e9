//! PostgreSQL backend implementation using sqlx.
//!
//! Provides connection pooling for the pg_prometheus store.

use sqlx::postgres::{PgConnectOptions, PgPool as SqlxPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::storage::StorageError;

/// PostgreSQL connection pool wrapper.
///
/// Wraps sqlx's PgPool with the adapter's session settings
/// (`statement_timeout`, optional `search_path`).
#[derive(Clone)]
pub struct PgPool {
    inner: SqlxPool,
}

impl std::fmt::Debug for PgPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPool").finish_non_exhaustive()
    }
}

impl PgPool {
    /// Connection options derived from configuration.
    ///
    /// The password is resolved through `${VAR}` expansion. When a schema is
    /// configured it becomes the session `search_path`.
    pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .database(&config.database);

        let password = config.resolved_password();
        if !password.is_empty() {
            options = options.password(&password);
        }

        options.options(session_options(config))
    }

    /// Connect using configuration values.
    ///
    /// # Errors
    /// Returns [`StorageError::Connection`] if no connection can be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        Self::connect_with(Self::connect_options(config), config).await
    }

    /// Connect with explicit options; pool limits still come from `config`.
    pub async fn connect_with(
        options: PgConnectOptions,
        config: &DatabaseConfig,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(StorageError::Connection)?;

        Ok(Self { inner: pool })
    }

    /// Create a pool that opens connections on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let inner = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_lazy_with(Self::connect_options(config));
        Self { inner }
    }

    /// Get the underlying sqlx pool for direct query execution.
    #[inline]
    pub fn inner(&self) -> &SqlxPool {
        &self.inner
    }

    /// Run `SELECT 1` against the store.
    pub async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.inner)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Health check failed");
                StorageError::Connection(e)
            })?;
        Ok(())
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.inner.close().await;
    }

    /// Check if the pool is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Startup parameters applied to every pooled session.
fn session_options(config: &DatabaseConfig) -> Vec<(&'static str, String)> {
    let mut params = vec![(
        "statement_timeout",
        config.statement_timeout.as_millis().to_string(),
    )];
    if let Some(schema) = config.schema() {
        params.push(("search_path", schema.to_string()));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_options_default() {
        let params = session_options(&DatabaseConfig::default());
        assert_eq!(params, vec![("statement_timeout", "30000".to_string())]);
    }

    #[test]
    fn test_session_options_with_schema() {
        let config = DatabaseConfig {
            schema: "prom".to_string(),
            statement_timeout: Duration::from_millis(1500),
            ..Default::default()
        };
        assert_eq!(
            session_options(&config),
            vec![
                ("statement_timeout", "1500".to_string()),
                ("search_path", "prom".to_string()),
            ]
        );
    }

    #[test]
    fn test_connect_options_from_config() {
        let config = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            database: "metrics".to_string(),
            ..Default::default()
        };
        let options = PgPool::connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "postgres");
        assert_eq!(options.get_database(), Some("metrics"));
    }

    #[tokio::test]
    async fn test_connect_unreachable_is_connection_error() {
        let config = DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let err = PgPool::connect(&config).await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }
}
