//! pg_prometheus provisioning.
//!
//! Creates the extension and the samples table (optionally the normalized
//! layout) on first start. Re-running against an already provisioned
//! database is a no-op.

use crate::config::DatabaseConfig;
use crate::storage::StorageError;
use crate::storage::db::PgPool;

/// Enables the pg_prometheus extension.
pub const CREATE_EXTENSION_SQL: &str = "CREATE EXTENSION IF NOT EXISTS pg_prometheus";

/// Creates the samples table through the extension's helper.
pub const CREATE_TABLE_SQL: &str =
    "SELECT create_prometheus_table($1, $2, normalized_tables => $3, keep_samples => $4)";

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Extension and table were created by this run.
    Created,
    /// The table already existed.
    AlreadyExists,
}

/// True when the store reports that the object is already there.
pub(crate) fn is_already_exists(err: &sqlx::Error) -> bool {
    err.to_string().contains("already exists")
}

/// Provision the extension and the configured table in one transaction.
///
/// # Errors
/// Returns [`StorageError::Provisioning`] unless the failure is an
/// "already exists" report.
pub async fn provision(
    pool: &PgPool,
    config: &DatabaseConfig,
) -> Result<Provisioned, StorageError> {
    let mut tx = pool
        .inner()
        .begin()
        .await
        .map_err(StorageError::Connection)?;

    sqlx::query(CREATE_EXTENSION_SQL)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Provisioning)?;

    let created = sqlx::query(CREATE_TABLE_SQL)
        .bind(&config.table)
        .bind(&config.normalized_table)
        .bind(config.normalized_schema)
        .bind(config.keep_samples)
        .execute(&mut *tx)
        .await;

    match created {
        Ok(_) => {}
        Err(e) if is_already_exists(&e) => {
            tracing::debug!(table = %config.table, error = %e, "Table already provisioned");
            // Transaction is aborted at this point; dropping it rolls back.
            return Ok(Provisioned::AlreadyExists);
        }
        Err(e) => return Err(StorageError::Provisioning(e)),
    }

    tx.commit().await.map_err(StorageError::Provisioning)?;

    tracing::info!(
        table = %config.table,
        normalized = config.normalized_schema,
        "Initialized pg_prometheus extension"
    );
    Ok(Provisioned::Created)
}
