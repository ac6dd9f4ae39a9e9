//! Core data types for the storage layer.
//!
//! - [`Sample`]: one data point handed to the write path
//! - [`Matcher`] / [`Query`]: label filters and time range for the read path
//! - [`TimeSeries`] / [`ReadResponse`]: series assembled by the read path
//!
//! All of these are call-scoped: they exist for the duration of one write
//! or read call and are dropped afterwards.

use std::collections::BTreeMap;

/// Reserved label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A single sample to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Sample timestamp in milliseconds since the Unix epoch (UTC).
    pub timestamp_ms: i64,
    /// Metric name.
    pub name: String,
    /// Extra labels, excluding the metric name.
    pub labels: BTreeMap<String, String>,
    /// Sample value.
    pub value: f64,
}

impl Sample {
    /// Create a sample without extra labels.
    pub fn new(name: impl Into<String>, value: f64, timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            name: name.into(),
            labels: BTreeMap::new(),
            value,
        }
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// How a matcher compares a label against its value.
///
/// Wire values outside the known range are preserved as `Unknown` so the
/// compiler can reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Equal,
    NotEqual,
    RegexMatch,
    RegexNoMatch,
    Unknown(i32),
}

impl MatchType {
    /// Wire representation of this match type.
    pub fn code(&self) -> i32 {
        match self {
            Self::Equal => 0,
            Self::NotEqual => 1,
            Self::RegexMatch => 2,
            Self::RegexNoMatch => 3,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<i32> for MatchType {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Equal,
            1 => Self::NotEqual,
            2 => Self::RegexMatch,
            3 => Self::RegexNoMatch,
            other => Self::Unknown(other),
        }
    }
}

/// A single label filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    /// Label name (`__name__` for the metric name).
    pub name: String,
    /// Comparison kind.
    pub kind: MatchType,
    /// Literal value or regular expression.
    pub value: String,
}

impl Matcher {
    pub fn new(name: impl Into<String>, kind: MatchType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }
}

/// A read query: matchers plus an inclusive time range in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub matchers: Vec<Matcher>,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A label name/value pair of a returned series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

/// A (timestamp, value) point of a returned series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// A series assembled by the read path.
///
/// Labels start with `__name__`, followed by the remaining labels in
/// lexicographic key order. Samples are kept in row arrival order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub labels: Vec<LabelPair>,
    pub samples: Vec<SamplePoint>,
}

/// Series matched by the queries of one read call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub timeseries: Vec<TimeSeries>,
}

/// Result container of one read call.
///
/// Holds a single [`QueryResult`] with the union of all series matched by
/// every query of the call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResponse {
    pub results: Vec<QueryResult>,
}

impl ReadResponse {
    /// Total number of series across all results.
    pub fn series_count(&self) -> usize {
        self.results.iter().map(|r| r.timeseries.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_from_code() {
        assert_eq!(MatchType::from(0), MatchType::Equal);
        assert_eq!(MatchType::from(1), MatchType::NotEqual);
        assert_eq!(MatchType::from(2), MatchType::RegexMatch);
        assert_eq!(MatchType::from(3), MatchType::RegexNoMatch);
        assert_eq!(MatchType::from(9), MatchType::Unknown(9));
    }

    #[test]
    fn test_match_type_code_roundtrip() {
        for code in [0, 1, 2, 3, 42, -1] {
            assert_eq!(MatchType::from(code).code(), code);
        }
    }

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new("up", 1.0, 1000)
            .with_label("job", "node")
            .with_label("instance", "a:9100");
        assert_eq!(sample.name, "up");
        assert_eq!(sample.labels.len(), 2);
        assert_eq!(sample.labels["job"], "node");
    }

    #[test]
    fn test_series_count() {
        let response = ReadResponse {
            results: vec![QueryResult {
                timeseries: vec![TimeSeries::default(), TimeSeries::default()],
            }],
        };
        assert_eq!(response.series_count(), 2);
    }
}
