//! Storage-specific error types.
//!
//! Every storage call returns a single terminal [`StorageError`]. Nothing is
//! retried; the variant tells the caller which stage of the call failed.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not connect to or acquire a connection from the store.
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Extension or table provisioning failed for a reason other than
    /// the object already existing.
    #[error("provisioning error: {0}")]
    Provisioning(#[source] sqlx::Error),

    /// A stored label document or column had an unexpected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// A matcher used a match kind the compiler does not know.
    #[error("unsupported match type {kind} for label '{label}'")]
    UnsupportedMatchType { label: String, kind: i32 },

    /// Formatting, streaming or committing a write batch failed.
    #[error("write error: {0}")]
    Write(String),

    /// Iterating result rows failed.
    #[error("scan error: {0}")]
    Scan(#[source] sqlx::Error),
}

impl StorageError {
    /// Wrap a driver error raised while the write transaction was open.
    pub(crate) fn write(err: sqlx::Error) -> Self {
        Self::Write(err.to_string())
    }

    /// True when the error came from the caller's request rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedMatchType { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
