//! Storage Layer
//!
//! Translation between Prometheus remote storage and a pg_prometheus
//! samples table:
//! - **Write**: samples are encoded as `prom_sample` text lines and bulk
//!   loaded with `COPY ... FROM STDIN` inside one transaction
//! - **Read**: matchers compile to predicates over the `prom_*` accessors;
//!   result rows are grouped into series by canonical label key
//!
//! # Components
//!
//! - [`SampleWriter`] / [`SampleReader`]: write and read facades
//! - [`CompiledQuery`]: matcher compiler output
//! - [`SampleLabels`]: label document decoding and canonical keys
//! - [`SeriesAggregator`]: row-to-series grouping
//! - [`StorageBuilder`] / [`StorageHandles`]: initialization and lifecycle management

use async_trait::async_trait;

pub mod aggregate;
mod builder;
pub mod copy;
pub mod db;
mod error;
mod facades;
pub mod labels;
pub mod matchers;
pub mod schema;
mod types;

pub use aggregate::{SampleRow, SeriesAggregator};
pub use builder::{StorageBuilder, StorageHandles};
pub use error::StorageError;
pub use facades::{SampleReader, SampleWriter};
pub use labels::{LabelDocument, SampleLabels};
pub use matchers::{CompiledQuery, Predicate};
pub use types::{
    LabelPair, METRIC_NAME_LABEL, MatchType, Matcher, Query, QueryResult, ReadResponse, Sample,
    SamplePoint, TimeSeries,
};

/// Remote storage operations used by the HTTP layer.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Write a batch of samples atomically.
    async fn write(&self, samples: &[Sample]) -> Result<(), StorageError>;

    /// Run read queries and return the union of matched series.
    async fn read(&self, queries: &[Query]) -> Result<ReadResponse, StorageError>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> Result<(), StorageError>;
}
