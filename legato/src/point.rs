//! Point model: measurement, tags, typed fields, optional timestamp.
//!
//! A [`Point`] is one time-series record. Tags and fields live in sorted
//! maps so the encoded output is canonical regardless of insertion order,
//! and duplicate keys collapse by construction (last write wins).
//!
//! # Example
//!
//! ```rust
//! use legato::point::Point;
//!
//! let point = Point::new("cpu")
//!     .tag("host", "web1")
//!     .field("usage", 87.5)
//!     .field("cores", 8i64)
//!     .timestamp(1_700_000_000_000_000_000);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Time unit in which point timestamps are expressed.
///
/// The precision is configured once per client (see
/// [`WriteOptions`](crate::config::WriteOptions)) and sent to the server as
/// the `precision` query parameter; timestamp integers on points are taken
/// to already be in this unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    /// Nanoseconds since the Unix epoch (the server default).
    #[default]
    #[serde(rename = "ns")]
    Nanosecond,
    /// Microseconds since the Unix epoch.
    #[serde(rename = "us")]
    Microsecond,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "ms")]
    Millisecond,
    /// Seconds since the Unix epoch.
    #[serde(rename = "s")]
    Second,
}

impl Precision {
    /// Wire name used in the write endpoint's `precision` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Nanosecond => "ns",
            Precision::Microsecond => "us",
            Precision::Millisecond => "ms",
            Precision::Second => "s",
        }
    }

    /// Current wall-clock time as a timestamp integer in this precision.
    #[allow(clippy::cast_possible_truncation)] // current epoch fits i64 in every precision
    pub fn now(self) -> i64 {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        match self {
            Precision::Nanosecond => since_epoch.as_nanos() as i64,
            Precision::Microsecond => since_epoch.as_micros() as i64,
            Precision::Millisecond => since_epoch.as_millis() as i64,
            Precision::Second => since_epoch.as_secs() as i64,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed field value.
///
/// Line protocol distinguishes four scalar types; keeping the type through
/// buffering lets the encoder render the exact wire form for each.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// UTF-8 string.
    String(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(f64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// One time-series record.
///
/// A point is only checked when it is written: the measurement must be
/// non-empty, at least one field must be present, and float fields must be
/// finite. Until then it is a plain value that can be built up freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Measurement name. Must be non-empty at write time.
    pub measurement: String,
    /// Tag key-value pairs, kept sorted for canonical encoding.
    pub tags: BTreeMap<String, String>,
    /// Field key-value pairs. At least one is required at write time.
    pub fields: BTreeMap<String, FieldValue>,
    /// Timestamp in the client's effective precision unit.
    ///
    /// `None` omits the timestamp so the server assigns ingestion time.
    pub timestamp: Option<i64>,
}

impl Point {
    /// Creates a point for `measurement` with no tags, fields, or timestamp.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Adds or replaces a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets the timestamp, in the client's effective precision unit.
    #[must_use]
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates() {
        let point = Point::new("cpu")
            .tag("host", "web1")
            .tag("region", "us-east")
            .field("usage", 42.5)
            .field("cores", 8i64)
            .timestamp(1_700_000_000);

        assert_eq!(point.measurement, "cpu");
        assert_eq!(point.tags.len(), 2);
        assert_eq!(point.tags["host"], "web1");
        assert_eq!(point.fields.len(), 2);
        assert_eq!(point.fields["usage"], FieldValue::Float(42.5));
        assert_eq!(point.fields["cores"], FieldValue::Integer(8));
        assert_eq!(point.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let point = Point::new("cpu")
            .tag("host", "web1")
            .tag("host", "web2")
            .field("usage", 1.0)
            .field("usage", 2.0);

        assert_eq!(point.tags.len(), 1);
        assert_eq!(point.tags["host"], "web2");
        assert_eq!(point.fields["usage"], FieldValue::Float(2.0));
    }

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from(1.5f64), FieldValue::Float(1.5));
        assert_eq!(FieldValue::from(1.5f32), FieldValue::Float(1.5));
        assert_eq!(FieldValue::from(7i64), FieldValue::Integer(7));
        assert_eq!(FieldValue::from(7i32), FieldValue::Integer(7));
        assert_eq!(FieldValue::from(true), FieldValue::Boolean(true));
        assert_eq!(
            FieldValue::from("hi"),
            FieldValue::String("hi".to_string())
        );
        assert_eq!(
            FieldValue::from("hi".to_string()),
            FieldValue::String("hi".to_string())
        );
    }

    #[test]
    fn test_precision_wire_names() {
        assert_eq!(Precision::Nanosecond.as_str(), "ns");
        assert_eq!(Precision::Microsecond.as_str(), "us");
        assert_eq!(Precision::Millisecond.as_str(), "ms");
        assert_eq!(Precision::Second.as_str(), "s");
        assert_eq!(Precision::default(), Precision::Nanosecond);
    }

    #[test]
    fn test_precision_serde_round_trip() {
        let json = serde_json::to_string(&Precision::Millisecond).unwrap();
        assert_eq!(json, "\"ms\"");
        let back: Precision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Precision::Millisecond);
    }

    #[test]
    fn test_precision_now_scales() {
        let ns = Precision::Nanosecond.now();
        let s = Precision::Second.now();
        // now() in seconds is roughly now() in nanos / 1e9
        let ratio = ns / 1_000_000_000;
        assert!((ratio - s).abs() <= 1, "ns={ns} s={s}");
    }
}
