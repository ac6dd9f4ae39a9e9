//! Label document decoding and canonical series keys.
//!
//! `prom_labels(sample)` yields a JSON document per row. It is decoded into
//! a [`SampleLabels`] map, which provides the deterministic key used to
//! group rows into series.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::storage::StorageError;
use crate::storage::types::{LabelPair, METRIC_NAME_LABEL};

/// Separator between key components. 0xFF never occurs in valid UTF-8.
pub const KEY_SEPARATOR: u8 = 0xFF;

/// Raw label column as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelDocument {
    /// SQL NULL.
    Null,
    /// A `json`/`jsonb` value.
    Json(Value),
    /// A JSON document delivered as text.
    Text(String),
}

impl From<Option<Value>> for LabelDocument {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Null, Self::Json)
    }
}

/// Decoded labels of one stored sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleLabels {
    map: BTreeMap<String, String>,
}

impl SampleLabels {
    /// Decode a label document.
    ///
    /// Accepts NULL (empty labels), a JSON object whose values are all
    /// strings, or text holding such an object.
    pub fn decode(doc: LabelDocument) -> Result<Self, StorageError> {
        match doc {
            LabelDocument::Null => Ok(Self::default()),
            LabelDocument::Json(value) => Self::from_value(value),
            LabelDocument::Text(text) => Self::from_value(serde_json::from_str(&text)?),
        }
    }

    fn from_value(value: Value) -> Result<Self, StorageError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(object) => {
                let mut map = BTreeMap::new();
                for (key, value) in object {
                    match value {
                        Value::String(s) => {
                            map.insert(key, s);
                        }
                        other => {
                            return Err(StorageError::Decode(format!(
                                "label '{key}' has non-string value {other}"
                            )));
                        }
                    }
                }
                Ok(Self { map })
            }
            other => Err(StorageError::Decode(format!(
                "invalid labels value: expected object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Label value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Label keys in lexicographic order.
    pub fn ordered_keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Canonical series key for these labels under metric `name`.
    ///
    /// Layout: `name SEP`, then `key SEP value` per sorted key, all entries
    /// joined by `SEP`.
    pub fn key(&self, name: &str) -> Vec<u8> {
        let capacity = name.len()
            + 1
            + self
                .map
                .iter()
                .map(|(k, v)| k.len() + v.len() + 2)
                .sum::<usize>();
        let mut key = Vec::with_capacity(capacity);
        key.extend_from_slice(name.as_bytes());
        key.push(KEY_SEPARATOR);
        for (k, v) in &self.map {
            key.push(KEY_SEPARATOR);
            key.extend_from_slice(k.as_bytes());
            key.push(KEY_SEPARATOR);
            key.extend_from_slice(v.as_bytes());
        }
        key
    }

    /// Label pairs of the series: `__name__` first, then sorted labels.
    pub fn to_label_pairs(&self, name: &str) -> Vec<LabelPair> {
        let mut pairs = Vec::with_capacity(self.map.len() + 1);
        pairs.push(LabelPair {
            name: METRIC_NAME_LABEL.to_string(),
            value: name.to_string(),
        });
        pairs.extend(self.map.iter().map(|(k, v)| LabelPair {
            name: k.clone(),
            value: v.clone(),
        }));
        pairs
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> SampleLabels {
        SampleLabels::decode(LabelDocument::Json(value)).unwrap()
    }

    #[test]
    fn test_decode_object() {
        let labels = decode(json!({"job": "node", "instance": "a:9100"}));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("job"), Some("node"));
        assert_eq!(
            labels.ordered_keys().collect::<Vec<_>>(),
            vec!["instance", "job"]
        );
    }

    #[test]
    fn test_decode_null_is_empty() {
        assert!(SampleLabels::decode(LabelDocument::Null).unwrap().is_empty());
        assert!(decode(Value::Null).is_empty());
    }

    #[test]
    fn test_decode_text() {
        let labels =
            SampleLabels::decode(LabelDocument::Text(r#"{"a":"1"}"#.to_string())).unwrap();
        assert_eq!(labels.get("a"), Some("1"));
    }

    #[test]
    fn test_decode_rejects_other_shapes() {
        for doc in [
            LabelDocument::Json(json!([1, 2])),
            LabelDocument::Json(json!(42)),
            LabelDocument::Json(json!("labels")),
            LabelDocument::Json(json!({"a": 1})),
            LabelDocument::Text("not json".to_string()),
            LabelDocument::Text("[]".to_string()),
        ] {
            let err = SampleLabels::decode(doc).unwrap_err();
            assert!(matches!(err, StorageError::Decode(_)), "got {err:?}");
        }
    }

    #[test]
    fn test_key_layout() {
        let labels = decode(json!({"b": "2", "a": "1"}));
        assert_eq!(labels.key("m"), b"m\xff\xffa\xff1\xffb\xff2".to_vec());
    }

    #[test]
    fn test_key_without_labels() {
        assert_eq!(SampleLabels::default().key("up"), b"up\xff".to_vec());
    }

    #[test]
    fn test_key_independent_of_input_order() {
        let forward = SampleLabels::decode(LabelDocument::Text(
            r#"{"a":"1","b":"2","c":"3"}"#.to_string(),
        ))
        .unwrap();
        let reverse = SampleLabels::decode(LabelDocument::Text(
            r#"{"c":"3","b":"2","a":"1"}"#.to_string(),
        ))
        .unwrap();
        let shuffled = decode(json!({"b": "2", "c": "3", "a": "1"}));

        assert_eq!(forward.key("m"), reverse.key("m"));
        assert_eq!(forward.key("m"), shuffled.key("m"));
    }

    #[test]
    fn test_key_distinguishes_boundaries() {
        let left = decode(json!({"a": "bc"}));
        let right = decode(json!({"ab": "c"}));
        assert_ne!(left.key("m"), right.key("m"));
        assert_ne!(decode(json!({"a": "1"})).key("m"), decode(json!({"a": "1"})).key("n"));
    }

    #[test]
    fn test_label_pairs_name_first() {
        let labels = decode(json!({"zone": "z", "app": "x"}));
        let pairs = labels.to_label_pairs("cpu");
        let names: Vec<_> = pairs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["__name__", "app", "zone"]);
        assert_eq!(pairs[0].value, "cpu");
    }
}
