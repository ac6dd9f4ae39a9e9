//! Database connection layer.
//!
//! Wraps the sqlx PostgreSQL pool used by both the write and read paths.
//!
//! # Example
//!
//! ```ignore
//! let pool = PgPool::connect(&DatabaseConfig::default()).await?;
//! pool.health_check().await?;
//! ```

mod postgres;

pub use postgres::PgPool;
