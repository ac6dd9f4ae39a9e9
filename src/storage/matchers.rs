//! Matcher compilation.
//!
//! Turns a [`Query`] into a typed predicate list over the pg_prometheus
//! accessor functions. The compiled query renders two ways:
//!
//! - [`CompiledQuery::build`]: a `sqlx::QueryBuilder` with every literal bound
//!   as a parameter. This is what gets executed.
//! - [`CompiledQuery::to_sql`]: a fully literal statement for logs, with
//!   single quotes doubled inside literals.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::storage::StorageError;
use crate::storage::types::{METRIC_NAME_LABEL, MatchType, Query};

const SELECT_COLUMNS: &str =
    "SELECT prom_time(sample), prom_name(sample), prom_value(sample), prom_labels(sample) FROM ";

/// Comparison operator of a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Matches,
    NotMatches,
}

impl Comparison {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Matches => "~",
            Self::NotMatches => "!~",
        }
    }
}

/// One condition of the WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Comparison against `prom_name(sample)`.
    Name { op: Comparison, value: String },
    /// `prom_labels(sample) @> {...}`: every listed pair must be present.
    LabelsContain(BTreeMap<String, String>),
    /// Comparison against `prom_labels(sample)->>label`.
    ///
    /// A row without the label yields NULL and never matches, including
    /// under `!=` and `!~`.
    Label {
        label: String,
        op: Comparison,
        value: String,
    },
    /// Inclusive lower time bound.
    TimeFrom(DateTime<Utc>),
    /// Inclusive upper time bound.
    TimeTo(DateTime<Utc>),
}

/// A query compiled against one samples table.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    table: String,
    predicates: Vec<Predicate>,
}

impl CompiledQuery {
    /// Compile `query` against `table`.
    ///
    /// Fails with [`StorageError::UnsupportedMatchType`] on an unknown match
    /// kind; nothing is produced in that case.
    pub fn compile(query: &Query, table: &str) -> Result<Self, StorageError> {
        let mut predicates = Vec::with_capacity(query.matchers.len() + 3);
        let mut label_equals = BTreeMap::new();

        for m in &query.matchers {
            let op = match m.kind {
                MatchType::Equal => Comparison::Equal,
                MatchType::NotEqual => Comparison::NotEqual,
                MatchType::RegexMatch => Comparison::Matches,
                MatchType::RegexNoMatch => Comparison::NotMatches,
                MatchType::Unknown(kind) => {
                    return Err(StorageError::UnsupportedMatchType {
                        label: m.name.clone(),
                        kind,
                    });
                }
            };
            let value = match op {
                Comparison::Matches | Comparison::NotMatches => anchor(&m.value),
                Comparison::Equal | Comparison::NotEqual => m.value.clone(),
            };

            if m.name == METRIC_NAME_LABEL {
                predicates.push(Predicate::Name { op, value });
            } else if op == Comparison::Equal {
                label_equals.insert(m.name.clone(), value);
            } else {
                predicates.push(Predicate::Label {
                    label: m.name.clone(),
                    op,
                    value,
                });
            }
        }

        if !label_equals.is_empty() {
            predicates.push(Predicate::LabelsContain(label_equals));
        }
        predicates.push(Predicate::TimeFrom(ms_to_time(query.start_ms)));
        predicates.push(Predicate::TimeTo(ms_to_time(query.end_ms)));

        Ok(Self {
            table: table.to_string(),
            predicates,
        })
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Render with bound parameters for execution.
    pub fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(SELECT_COLUMNS);
        qb.push(quote_ident(&self.table));
        qb.push(" WHERE ");

        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                qb.push(" AND ");
            }
            match predicate {
                Predicate::Name { op, value } => {
                    qb.push(format_args!("prom_name(sample) {} ", op.as_sql()));
                    qb.push_bind(value.clone());
                }
                Predicate::LabelsContain(labels) => {
                    qb.push("prom_labels(sample) @> ");
                    qb.push_bind(sqlx::types::Json(labels.clone()));
                }
                Predicate::Label { label, op, value } => {
                    qb.push("prom_labels(sample)->>");
                    qb.push_bind(label.clone());
                    qb.push(format_args!(" {} ", op.as_sql()));
                    qb.push_bind(value.clone());
                }
                Predicate::TimeFrom(ts) => {
                    qb.push("prom_time(sample) >= ");
                    qb.push_bind(*ts);
                }
                Predicate::TimeTo(ts) => {
                    qb.push("prom_time(sample) <= ");
                    qb.push_bind(*ts);
                }
            }
        }
        qb
    }

    /// Render as a single literal statement.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from(SELECT_COLUMNS);
        sql.push_str(&quote_ident(&self.table));
        sql.push_str(" WHERE ");

        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            let fragment = match predicate {
                Predicate::Name { op, value } => format!(
                    "prom_name(sample) {} {}",
                    op.as_sql(),
                    quote_literal(value)
                ),
                Predicate::LabelsContain(labels) => format!(
                    "prom_labels(sample) @> {}",
                    quote_literal(&labels_json(labels))
                ),
                Predicate::Label { label, op, value } => format!(
                    "prom_labels(sample)->>{} {} {}",
                    quote_literal(label),
                    op.as_sql(),
                    quote_literal(value)
                ),
                Predicate::TimeFrom(ts) => {
                    format!("prom_time(sample) >= {}", quote_literal(&format_time(ts)))
                }
                Predicate::TimeTo(ts) => {
                    format!("prom_time(sample) <= {}", quote_literal(&format_time(ts)))
                }
            };
            sql.push_str(&fragment);
        }
        sql
    }
}

/// Compile every query against `table`.
///
/// Either all queries compile or none are returned.
pub fn compile_all(queries: &[Query], table: &str) -> Result<Vec<CompiledQuery>, StorageError> {
    queries
        .iter()
        .map(|q| CompiledQuery::compile(q, table))
        .collect()
}

/// Fully anchor a regular expression, alternations included.
fn anchor(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

/// Convert milliseconds since the epoch to a timestamp.
///
/// Values outside chrono's range are clamped to its bounds.
pub fn ms_to_time(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(if ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// RFC 3339 with millisecond precision, e.g. `1970-01-01T00:00:01.500Z`.
pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Escape a string for use inside a single-quoted SQL literal.
pub fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Single-quoted SQL literal.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", escape_literal(s))
}

/// Double-quoted SQL identifier.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn labels_json(labels: &BTreeMap<String, String>) -> String {
    Value::Object(
        labels
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
    .to_string()
}
