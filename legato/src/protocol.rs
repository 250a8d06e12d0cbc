//! Line protocol encoding.
//!
//! One record per line:
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp
//! ```
//!
//! Escaping rules: commas and spaces in measurement names, and commas,
//! spaces, and equals signs in tag keys, tag values, and field keys are
//! backslash-escaped. String field values are double-quoted with internal
//! quotes and backslashes escaped. Field values are type-tagged on the wire:
//! integers carry an `i` suffix, booleans render as `t`/`f`, floats use
//! Rust's shortest round-trippable `{}` form, so `3.0` encodes as `3`
//! (unsuffixed numbers are floats in line protocol).
//!
//! Tags are emitted in lexicographic key order, which makes the output
//! canonical and keeps server-side series identity stable. Timestamps are
//! appended verbatim; the integer is already in the client's effective
//! precision unit.

use std::collections::BTreeMap;

use crate::error::EncodingError;
use crate::point::{FieldValue, Point};

/// Encodes a single point as one line-protocol record.
///
/// # Errors
///
/// Returns [`EncodingError`] if the measurement is empty, the point has no
/// fields, or a float field is NaN or infinite.
///
/// # Example
///
/// ```rust
/// use legato::point::Point;
/// use legato::protocol::encode;
///
/// let point = Point::new("cpu").tag("host", "web1").field("usage", 42.5);
/// assert_eq!(encode(&point).unwrap(), "cpu,host=web1 usage=42.5");
/// ```
pub fn encode(point: &Point) -> Result<String, EncodingError> {
    let mut line = String::new();
    encode_into(point, &BTreeMap::new(), &mut line)?;
    Ok(line)
}

/// Encodes `point` into `out`, merging `default_tags` into the tag set.
///
/// Point-level tags win over default tags on key collision. Both maps are
/// sorted, so the merged tag list stays in lexicographic key order.
pub(crate) fn encode_into(
    point: &Point,
    default_tags: &BTreeMap<String, String>,
    out: &mut String,
) -> Result<(), EncodingError> {
    if point.measurement.is_empty() {
        return Err(EncodingError::EmptyMeasurement);
    }
    if point.fields.is_empty() {
        return Err(EncodingError::NoFields {
            measurement: point.measurement.clone(),
        });
    }
    for (key, value) in &point.fields {
        if let FieldValue::Float(v) = value
            && !v.is_finite()
        {
            return Err(EncodingError::NonFiniteFloat {
                field: key.clone(),
                value: *v,
            });
        }
    }

    escape_measurement(&point.measurement, out);

    if default_tags.is_empty() {
        for (key, value) in &point.tags {
            write_tag(key, value, out);
        }
    } else {
        let mut merged = default_tags.clone();
        merged.extend(point.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (key, value) in &merged {
            write_tag(key, value, out);
        }
    }

    for (i, (key, value)) in point.fields.iter().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        escape_identifier(key, out);
        out.push('=');
        write_field_value(value, out);
    }

    if let Some(ts) = point.timestamp {
        out.push(' ');
        out.push_str(&ts.to_string());
    }

    Ok(())
}

fn write_tag(key: &str, value: &str, out: &mut String) {
    out.push(',');
    escape_identifier(key, out);
    out.push('=');
    escape_identifier(value, out);
}

fn write_field_value(value: &FieldValue, out: &mut String) {
    match value {
        FieldValue::Float(v) => out.push_str(&v.to_string()),
        FieldValue::Integer(v) => {
            out.push_str(&v.to_string());
            out.push('i');
        }
        FieldValue::Boolean(true) => out.push('t'),
        FieldValue::Boolean(false) => out.push('f'),
        FieldValue::String(s) => {
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
}

/// Escapes a measurement name: commas and spaces.
fn escape_measurement(s: &str, out: &mut String) {
    for c in s.chars() {
        if c == ',' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Escapes a tag key, tag value, or field key: commas, spaces, equals.
fn escape_identifier(s: &str, out: &mut String) {
    for c in s.chars() {
        if c == ',' || c == ' ' || c == '=' {
            out.push('\\');
        }
        out.push(c);
    }
}
