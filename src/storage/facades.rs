//! User-facing storage facades.
//!
//! - `SampleWriter`: bulk-loads a batch of samples in one transaction
//! - `SampleReader`: runs remote read queries and groups rows into series

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::storage::StorageError;
use crate::storage::aggregate::{SampleRow, SeriesAggregator};
use crate::storage::copy::{format_line, push_copy_row};
use crate::storage::db::PgPool;
use crate::storage::labels::{LabelDocument, SampleLabels};
use crate::storage::matchers::{CompiledQuery, compile_all, quote_ident};
use crate::storage::types::{Query, ReadResponse, Sample};

// =============================================================================
// Constants
// =============================================================================

/// Buffered COPY payload size before it is sent to the server.
const COPY_CHUNK_BYTES: usize = 64 * 1024;

// =============================================================================
// Writer
// =============================================================================

/// Transactional bulk writer.
///
/// Every call is one transaction holding one `COPY ... FROM STDIN`. The
/// batch is committed only after every sample was streamed; any failure
/// rolls the whole batch back.
#[derive(Clone)]
pub struct SampleWriter {
    pool: PgPool,
    table: String,
}

impl std::fmt::Debug for SampleWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleWriter")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SampleWriter {
    pub(crate) fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// The COPY statement targeting the configured table.
    pub fn copy_statement(&self) -> String {
        format!("COPY {} FROM STDIN", quote_ident(&self.table))
    }

    /// Write a batch of samples, all or nothing.
    ///
    /// # Errors
    /// Returns [`StorageError::Write`] on any formatting, streaming or commit
    /// failure. Nothing from the batch is visible afterwards.
    pub async fn write(&self, samples: &[Sample]) -> Result<(), StorageError> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.inner().begin().await.map_err(StorageError::write)?;
        let mut copy = tx
            .copy_in_raw(&self.copy_statement())
            .await
            .map_err(StorageError::write)?;

        let streamed = async {
            let mut buf = Vec::with_capacity(COPY_CHUNK_BYTES);
            for sample in samples {
                push_copy_row(&mut buf, &format_line(sample)?);
                if buf.len() >= COPY_CHUNK_BYTES {
                    copy.send(std::mem::take(&mut buf))
                        .await
                        .map_err(StorageError::write)?;
                }
            }
            if !buf.is_empty() {
                copy.send(buf).await.map_err(StorageError::write)?;
            }
            Ok::<(), StorageError>(())
        }
        .await;

        if let Err(e) = streamed {
            if let Err(abort_err) = copy.abort(e.to_string()).await {
                tracing::debug!(error = %abort_err, "COPY abort reported an error");
            }
            rollback(tx).await;
            return Err(e);
        }

        let rows = match copy.finish().await {
            Ok(rows) => rows,
            Err(e) => {
                rollback(tx).await;
                return Err(StorageError::write(e));
            }
        };

        tx.commit().await.map_err(StorageError::write)?;

        tracing::debug!(table = %self.table, rows, "Wrote samples");
        Ok(())
    }
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::Postgres>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Remote read executor.
#[derive(Clone)]
pub struct SampleReader {
    pool: PgPool,
    table: String,
}

impl std::fmt::Debug for SampleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleReader")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SampleReader {
    pub(crate) fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Compile every query against the configured table.
    ///
    /// Fails before anything runs if any query has an unknown match kind.
    pub fn compile(&self, queries: &[Query]) -> Result<Vec<CompiledQuery>, StorageError> {
        compile_all(queries, &self.table)
    }

    /// Run all queries and merge their rows into one result container.
    ///
    /// Queries run one after another; their rows share a single grouping
    /// map owned by this call.
    ///
    /// # Errors
    /// [`StorageError::UnsupportedMatchType`] before any query runs,
    /// [`StorageError::Scan`] or [`StorageError::Decode`] while reading rows.
    pub async fn read(&self, queries: &[Query]) -> Result<ReadResponse, StorageError> {
        let compiled = self.compile(queries)?;
        let mut aggregator = SeriesAggregator::new();

        for query in &compiled {
            tracing::debug!(sql = %query.to_sql(), "Query");

            let mut builder = query.build();
            let mut rows = builder.build().fetch(self.pool.inner());
            while let Some(row) = rows.try_next().await.map_err(StorageError::Scan)? {
                aggregator.push(decode_row(&row)?);
            }
        }

        let response = aggregator.finish();
        tracing::debug!(series = response.series_count(), "Read finished");
        Ok(response)
    }
}

/// Decode `prom_time, prom_name, prom_value, prom_labels`.
fn decode_row(row: &PgRow) -> Result<SampleRow, StorageError> {
    let time: DateTime<Utc> = row.try_get(0).map_err(column_error)?;
    let name: String = row.try_get(1).map_err(column_error)?;
    let value: f64 = row.try_get(2).map_err(column_error)?;
    let labels = SampleLabels::decode(label_document(row)?)?;

    Ok(SampleRow {
        time,
        name,
        value,
        labels,
    })
}

/// Read the labels column as JSON, falling back to text.
fn label_document(row: &PgRow) -> Result<LabelDocument, StorageError> {
    match row.try_get::<Option<serde_json::Value>, _>(3) {
        Ok(value) => Ok(LabelDocument::from(value)),
        Err(json_err) => match row.try_get::<Option<String>, _>(3) {
            Ok(Some(text)) => Ok(LabelDocument::Text(text)),
            Ok(None) => Ok(LabelDocument::Null),
            Err(_) => Err(column_error(json_err)),
        },
    }
}

fn column_error(err: sqlx::Error) -> StorageError {
    StorageError::Decode(format!("unexpected column: {err}"))
}
