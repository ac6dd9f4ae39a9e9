//! pgprom Binary Entry Point
//!
//! This binary runs the remote storage adapter.
//! Core functionality is provided by the `pgprom` library crate.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use pgprom::{
    config::{AppConfig, parse_duration},
    server::{AppState, create_router},
    storage::{StorageBuilder, StorageHandles},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration file used when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// pgprom - Prometheus remote storage adapter for PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "pgprom", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PGPROM_CONFIG")]
    config: Option<String>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "PGPROM_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "PGPROM_SERVER_PORT")]
    server_port: Option<u16>,

    /// PostgreSQL host
    #[arg(long, env = "PGPROM_POSTGRES_HOST")]
    postgres_host: Option<String>,

    /// PostgreSQL port
    #[arg(long, env = "PGPROM_POSTGRES_PORT")]
    postgres_port: Option<u16>,

    /// PostgreSQL user
    #[arg(long, env = "PGPROM_POSTGRES_USER")]
    postgres_user: Option<String>,

    /// PostgreSQL password
    #[arg(long, env = "PGPROM_POSTGRES_PASSWORD", hide_env_values = true)]
    postgres_password: Option<String>,

    /// PostgreSQL database
    #[arg(long, env = "PGPROM_POSTGRES_DATABASE")]
    postgres_database: Option<String>,

    /// PostgreSQL schema
    #[arg(long, env = "PGPROM_POSTGRES_SCHEMA")]
    postgres_schema: Option<String>,

    /// PostgreSQL samples table
    #[arg(long, env = "PGPROM_POSTGRES_TABLE")]
    postgres_table: Option<String>,

    /// Statement timeout, e.g. `30s`
    #[arg(long, env = "PGPROM_POSTGRES_STATEMENT_TIMEOUT", value_parser = parse_duration)]
    postgres_statement_timeout: Option<Duration>,

    /// Use pg_prometheus normalized schema
    #[arg(long, env = "PGPROM_PG_PROMETHEUS_NORMALIZED_SCHEMA")]
    pg_prometheus_normalized_schema: Option<bool>,

    /// Metric table name used by the normalized schema
    #[arg(long, env = "PGPROM_PG_PROMETHEUS_NORMALIZED_TABLE_NAME")]
    pg_prometheus_normalized_table_name: Option<String>,

    /// Keep raw samples alongside the normalized tables
    #[arg(long, env = "PGPROM_PG_PROMETHEUS_KEEP_SAMPLES")]
    pg_prometheus_keep_samples: Option<bool>,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply(self, config: &mut AppConfig) {
        if let Some(bind) = self.server_bind {
            config.server.bind = bind;
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }

        let db = &mut config.database;
        if let Some(host) = self.postgres_host {
            db.host = host;
        }
        if let Some(port) = self.postgres_port {
            db.port = port;
        }
        if let Some(user) = self.postgres_user {
            db.user = user;
        }
        if let Some(password) = self.postgres_password {
            db.password = password;
        }
        if let Some(database) = self.postgres_database {
            db.database = database;
        }
        if let Some(schema) = self.postgres_schema {
            db.schema = schema;
        }
        if let Some(table) = self.postgres_table {
            db.table = table;
        }
        if let Some(timeout) = self.postgres_statement_timeout {
            db.statement_timeout = timeout;
        }
        if let Some(normalized) = self.pg_prometheus_normalized_schema {
            db.normalized_schema = normalized;
        }
        if let Some(name) = self.pg_prometheus_normalized_table_name {
            db.normalized_table = name;
        }
        if let Some(keep) = self.pg_prometheus_keep_samples {
            db.keep_samples = keep;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pgprom=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("pgprom - Prometheus remote storage adapter");

    let mut cli = Cli::parse();

    // An explicit config path must exist; the default one is optional
    let mut config = match cli.config.take() {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load(&path)?
        }
        None => AppConfig::load_or_default(DEFAULT_CONFIG_PATH)?,
    };

    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Database: {}@{}:{}/{} (table {})",
        config.server.bind,
        config.server.port,
        config.database.user,
        config.database.host,
        config.database.port,
        config.database.database,
        config.database.table,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    // Connection and provisioning failures are fatal
    let handles = StorageBuilder::new(config.database).build().await?;
    tracing::info!("Storage initialized");

    let app = create_router(AppState::new(handles.clone()));

    tracing::info!("Listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(handles))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(handles: StorageHandles) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Shutting down storage...");
    if let Err(e) = handles.shutdown().await {
        tracing::error!("Failed to shutdown storage: {}", e);
    }
}
