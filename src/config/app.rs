//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_env_vars, validate_table_name};

// =============================================================================
// Constants
// =============================================================================

/// Default adapter listen port.
pub const DEFAULT_PORT: u16 = 9201;

/// Default samples table.
pub const DEFAULT_TABLE: &str = "samples";

/// Default metrics table for the normalized layout.
pub const DEFAULT_NORMALIZED_TABLE: &str = "metrics";

/// Default maximum pool connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connect/acquire timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-statement timeout.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_normalized_table() -> String {
    DEFAULT_NORMALIZED_TABLE.to_string()
}

fn default_keep_samples() -> bool {
    true
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_statement_timeout() -> Duration {
    DEFAULT_STATEMENT_TIMEOUT
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9201).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

/// PostgreSQL / pg_prometheus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    /// Supports `${VAR}` / `${VAR:-default}` expansion.
    #[serde(default)]
    pub password: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Schema placed on the `search_path`; empty keeps the server default.
    #[serde(default)]
    pub schema: String,

    /// Samples table written with COPY and queried on read.
    #[serde(default = "default_table")]
    pub table: String,

    /// Provision the normalized pg_prometheus layout.
    #[serde(default)]
    pub normalized_schema: bool,

    /// Metrics table name of the normalized layout.
    #[serde(default = "default_normalized_table")]
    pub normalized_table: String,

    /// Keep raw samples alongside the normalized tables.
    #[serde(default = "default_keep_samples")]
    pub keep_samples: bool,

    /// Maximum pool connections (default: 10).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout (default: 10s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Server-side `statement_timeout` (default: 30s).
    #[serde(default = "default_statement_timeout", with = "humantime_serde")]
    pub statement_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_pg_port(),
            user: default_user(),
            password: String::new(),
            database: default_database(),
            schema: String::new(),
            table: default_table(),
            normalized_schema: false,
            normalized_table: default_normalized_table(),
            keep_samples: default_keep_samples(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }
}

impl DatabaseConfig {
    /// Password with environment variables expanded.
    pub fn resolved_password(&self) -> String {
        expand_env_vars(&self.password)
    }

    /// Schema, if one was configured.
    pub fn schema(&self) -> Option<&str> {
        let schema = self.schema.trim();
        (!schema.is_empty()).then_some(schema)
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if self.database.port == 0 {
            return Err(ConfigError::ValidationError(
                "database port must be non-zero".to_string(),
            ));
        }

        validate_table_name("database table", &self.database.table)?;
        validate_table_name("database normalized_table", &self.database.normalized_table)?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database max_connections must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
