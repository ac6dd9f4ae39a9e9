//! Line encoding for bulk ingestion via `COPY ... FROM STDIN`.
//!
//! Each sample becomes one `prom_sample` text value:
//! `<series-text> <value> <timestamp-ms>`, e.g. `m{a="1"} 1.5 1000`.

use std::collections::BTreeMap;

use crate::storage::StorageError;
use crate::storage::types::Sample;

/// Human-readable series text: `name` or `name{k="v",...}`.
///
/// Labels come from a sorted map, so the output order is lexicographic by key.
pub fn series_text(name: &str, labels: &BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + labels.len() * 16);
    out.push_str(name);
    out.push('{');
    for (i, (k, v)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(k);
        out.push_str("=\"");
        escape_label_value(v, &mut out);
        out.push('"');
    }
    out.push('}');
    out
}

fn escape_label_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

/// Sample value text; non-finite values use Prometheus spelling.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Format one sample as a load line, without the trailing newline.
pub fn format_line(sample: &Sample) -> Result<String, StorageError> {
    if sample.name.is_empty() {
        return Err(StorageError::Write(format!(
            "sample at {} has no metric name",
            sample.timestamp_ms
        )));
    }
    Ok(format!(
        "{} {} {}",
        series_text(&sample.name, &sample.labels),
        format_value(sample.value),
        sample.timestamp_ms
    ))
}

/// Append `line` to `buf` escaped for the COPY text format, plus a newline.
pub fn push_copy_row(buf: &mut Vec<u8>, line: &str) {
    for b in line.bytes() {
        match b {
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            b => buf.push(b),
        }
    }
    buf.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_with_labels() {
        let sample = Sample::new("m", 1.5, 1000).with_label("a", "1");
        assert_eq!(format_line(&sample).unwrap(), r#"m{a="1"} 1.5 1000"#);
    }

    #[test]
    fn test_line_without_labels() {
        let sample = Sample::new("m", 2.0, 2000);
        assert_eq!(format_line(&sample).unwrap(), "m 2 2000");
    }

    #[test]
    fn test_labels_sorted() {
        let sample = Sample::new("http_requests_total", 10.0, 5)
            .with_label("method", "GET")
            .with_label("code", "200")
            .with_label("handler", "/api");
        assert_eq!(
            format_line(&sample).unwrap(),
            r#"http_requests_total{code="200",handler="/api",method="GET"} 10 5"#
        );
    }

    #[test]
    fn test_label_value_quoting() {
        let sample = Sample::new("m", 1.0, 1).with_label("path", "C:\\tmp \"x\"");
        assert_eq!(
            format_line(&sample).unwrap(),
            r#"m{path="C:\\tmp \"x\""} 1 1"#
        );
    }

    #[test]
    fn test_special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(-0.25), "-0.25");
        assert_eq!(format_value(0.1), "0.1");
    }

    #[test]
    fn test_negative_timestamp() {
        let sample = Sample::new("m", 1.0, -5);
        assert_eq!(format_line(&sample).unwrap(), "m 1 -5");
    }

    #[test]
    fn test_empty_name_rejected() {
        let sample = Sample::new("", 1.0, 1).with_label("a", "1");
        assert!(matches!(format_line(&sample), Err(StorageError::Write(_))));
    }

    #[test]
    fn test_copy_row_escaping() {
        let mut buf = Vec::new();
        push_copy_row(&mut buf, "m{a=\"x\\y\"} 1 1");
        push_copy_row(&mut buf, "tab\there");
        assert_eq!(buf, b"m{a=\"x\\\\y\"} 1 1\ntab\\there\n".to_vec());
    }

    #[test]
    fn test_rows_for_batch() {
        let samples = vec![
            Sample::new("m", 1.5, 1000).with_label("a", "1"),
            Sample::new("m", 2.0, 2000),
        ];
        let mut buf = Vec::new();
        for sample in &samples {
            push_copy_row(&mut buf, &format_line(sample).unwrap());
        }
        assert_eq!(buf, b"m{a=\"1\"} 1.5 1000\nm 2 2000\n".to_vec());
    }
}
