//! Prometheus remote storage wire format.
//!
//! Message definitions follow `prompb/remote.proto` and `prompb/types.proto`;
//! only the fields this adapter reads or writes are declared. Request and
//! response bodies are snappy block-compressed protobuf.
//!
//! See https://prometheus.io/docs/concepts/remote_write_spec/

use prost::Message;
use thiserror::Error;

use crate::storage::{self, METRIC_NAME_LABEL};

// =============================================================================
// Messages
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// ReadRequest represents a remote read request.
#[derive(Clone, PartialEq, Message)]
pub struct ReadRequest {
    #[prost(message, repeated, tag = "1")]
    pub queries: Vec<Query>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Query {
    #[prost(int64, tag = "1")]
    pub start_timestamp_ms: i64,
    #[prost(int64, tag = "2")]
    pub end_timestamp_ms: i64,
    #[prost(message, repeated, tag = "3")]
    pub matchers: Vec<LabelMatcher>,
}

/// Matcher specifies a rule, which can match or set of labels or not.
///
/// `type` is kept as a raw `i32` so unknown kinds reach the compiler.
#[derive(Clone, PartialEq, Message)]
pub struct LabelMatcher {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub value: String,
}

/// ReadResponse is a response when response_type equals SAMPLES.
#[derive(Clone, PartialEq, Message)]
pub struct ReadResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<QueryResult>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryResult {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

// =============================================================================
// Codec
// =============================================================================

/// Errors decoding a remote storage request body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("snappy decode failed: {0}")]
    Snappy(#[from] snap::Error),

    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Decode a snappy-compressed protobuf message.
pub fn decode_snappy<M: Message + Default>(body: &[u8]) -> Result<M, CodecError> {
    let raw = snap::raw::Decoder::new().decompress_vec(body)?;
    Ok(M::decode(raw.as_slice())?)
}

/// Encode a protobuf message and snappy-compress it.
pub fn encode_snappy<M: Message>(message: &M) -> Result<Vec<u8>, CodecError> {
    Ok(snap::raw::Encoder::new().compress_vec(&message.encode_to_vec())?)
}

// =============================================================================
// Conversions
// =============================================================================

/// Flatten a write request into samples, series by series.
///
/// The `__name__` label becomes the sample name; a series without one gets
/// an empty name, which the writer rejects.
pub fn samples_from_write_request(request: WriteRequest) -> Vec<storage::Sample> {
    let total = request.timeseries.iter().map(|ts| ts.samples.len()).sum();
    let mut samples = Vec::with_capacity(total);

    for ts in request.timeseries {
        let mut name = String::new();
        let mut labels = std::collections::BTreeMap::new();
        for label in ts.labels {
            if label.name == METRIC_NAME_LABEL {
                name = label.value;
            } else {
                labels.insert(label.name, label.value);
            }
        }

        for s in ts.samples {
            samples.push(storage::Sample {
                timestamp_ms: s.timestamp,
                name: name.clone(),
                labels: labels.clone(),
                value: s.value,
            });
        }
    }
    samples
}

/// Convert read queries into domain queries.
pub fn queries_from_read_request(request: ReadRequest) -> Vec<storage::Query> {
    request
        .queries
        .into_iter()
        .map(|q| storage::Query {
            matchers: q
                .matchers
                .into_iter()
                .map(|m| storage::Matcher::new(m.name, m.r#type.into(), m.value))
                .collect(),
            start_ms: q.start_timestamp_ms,
            end_ms: q.end_timestamp_ms,
        })
        .collect()
}

impl From<storage::ReadResponse> for ReadResponse {
    fn from(response: storage::ReadResponse) -> Self {
        Self {
            results: response
                .results
                .into_iter()
                .map(|r| QueryResult {
                    timeseries: r.timeseries.into_iter().map(TimeSeries::from).collect(),
                })
                .collect(),
        }
    }
}

impl From<storage::TimeSeries> for TimeSeries {
    fn from(series: storage::TimeSeries) -> Self {
        Self {
            labels: series
                .labels
                .into_iter()
                .map(|l| Label {
                    name: l.name,
                    value: l.value,
                })
                .collect(),
            samples: series
                .samples
                .into_iter()
                .map(|s| Sample {
                    value: s.value,
                    timestamp: s.timestamp_ms,
                })
                .collect(),
        }
    }
}
