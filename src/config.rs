//! Configuration module for pgprom.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Database settings (connection, pg_prometheus table layout, pool limits)

mod app;
mod validation;

pub use app::{AppConfig, DatabaseConfig, ServerConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_NORMALIZED_TABLE, DEFAULT_PORT,
    DEFAULT_STATEMENT_TIMEOUT, DEFAULT_TABLE,
};
