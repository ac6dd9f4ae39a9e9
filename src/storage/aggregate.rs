//! Folding result rows into series.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::storage::labels::SampleLabels;
use crate::storage::types::{QueryResult, ReadResponse, SamplePoint, TimeSeries};

/// One decoded result row.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub time: DateTime<Utc>,
    pub name: String,
    pub value: f64,
    pub labels: SampleLabels,
}

/// Groups rows by canonical key into series.
///
/// Owned by a single read call; rows of every query in that call go into
/// the same instance. Samples are appended in arrival order and are neither
/// sorted nor de-duplicated, so per-series ordering is whatever order the
/// store returned the rows in.
#[derive(Debug, Default)]
pub struct SeriesAggregator {
    index: HashMap<Vec<u8>, usize>,
    series: Vec<TimeSeries>,
}

impl SeriesAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to its series, creating the series on first sight.
    pub fn push(&mut self, row: SampleRow) {
        let key = row.labels.key(&row.name);
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.series.push(TimeSeries {
                    labels: row.labels.to_label_pairs(&row.name),
                    samples: Vec::new(),
                });
                let idx = self.series.len() - 1;
                self.index.insert(key, idx);
                idx
            }
        };
        self.series[idx].samples.push(SamplePoint {
            timestamp_ms: row.time.timestamp_millis(),
            value: row.value,
        });
    }

    /// Number of distinct series seen so far.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Bundle every series into one result container, in first-seen order.
    pub fn finish(self) -> ReadResponse {
        ReadResponse {
            results: vec![QueryResult {
                timeseries: self.series,
            }],
        }
    }
}
