//! pgprom - Prometheus remote storage on PostgreSQL
//!
//! This crate bridges Prometheus remote write/read and a pg_prometheus
//! samples table. It can be used as a library, or run as a standalone
//! adapter with the `pgprom` executable.
//!
//! # Architecture
//!
//! - **Remote**: snappy protobuf request/response messages
//! - **Storage**: COPY-based bulk writer, matcher compiler and series grouping
//! - **Server**: axum endpoints for `/write`, `/read` and health probes
//!
//! # Example
//!
//! ```rust,ignore
//! use pgprom::{AppConfig, StorageBuilder};
//! use pgprom::server::{AppState, create_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load_or_default("configs/config.yaml")?;
//!     let handles = StorageBuilder::new(config.database).build().await?;
//!     let app = create_router(AppState::new(handles));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:9201").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod remote;
pub mod server;
pub mod storage;

pub use config::{AppConfig, ConfigError, DatabaseConfig, ServerConfig};
pub use storage::{
    MatchType, Matcher, Query, ReadResponse, RemoteStorage, Sample, StorageBuilder, StorageError,
    StorageHandles,
};
