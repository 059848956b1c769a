//! Value coercion.
//!
//! Coercion never fails: a value that cannot be converted becomes the
//! type's sentinel (`0` for integers, `null` otherwise) and is left for the
//! schema's predicates to reject.

use super::schema::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Number, Value};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Coerces `value` to `field_type`.
#[must_use]
pub fn coerce(value: &Value, field_type: FieldType) -> Value {
    match field_type {
        FieldType::Integer => Value::from(to_integer(value).unwrap_or(0)),
        FieldType::Decimal => to_decimal(value)
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        FieldType::Timestamp => to_timestamp(value).map_or(Value::Null, |dt| {
            Value::String(dt.format(TIMESTAMP_FORMAT).to_string())
        }),
        FieldType::Date => to_timestamp(value).map_or(Value::Null, |dt| {
            Value::String(dt.format(DATE_FORMAT).to_string())
        }),
        FieldType::Text => match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        },
    }
}

fn to_decimal(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Integers truncate toward zero, so `"3.7"` becomes `3`.
#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    if let Value::String(s) = value {
        if let Ok(i) = s.trim().parse::<i64>() {
            return Some(i);
        }
    }
    to_decimal(value)
        .filter(|v| *v >= i64::MIN as f64 && *v <= i64::MAX as f64)
        .map(|v| v.trunc() as i64)
}

fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_f64().and_then(from_unix),
        _ => None,
    }
}

/// Parses ISO 8601, RFC 3339, RFC 2822 and common human-readable forms.
///
/// Values without an offset are taken as UTC.
#[must_use]
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&trimmed.replace('Z', "+00:00")) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Interprets a Unix timestamp, detecting second/milli/microsecond precision
/// from the digit count.
#[allow(clippy::cast_possible_truncation)]
fn from_unix(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let micros = match value.abs().trunc() {
        v if v < 1e11 => value * 1e6,
        v if v < 1e14 => value * 1e3,
        v if v < 1e17 => value,
        _ => return None,
    };
    Utc.timestamp_micros(micros.trunc() as i64).single()
}
