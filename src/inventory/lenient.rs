//! Tolerant field decoders for rows coming back from the listings table.
//!
//! Columns in the store are nullable and older rows carry mixed encodings
//! (numeric strings, `null` arrays). Every decoder here accepts whatever JSON
//! the gateway returns and maps anything unusable onto the field's neutral
//! value instead of failing the whole row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{Deserializer, Error as _};
use serde::Deserialize;
use serde_json::Value;

use crate::inventory::model::{ListingStatus, SourceType};

fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Option::<Value>::deserialize(deserializer)
}

/// Parse a number or numeric string, ignoring a currency sign and separators
pub(crate) fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Row identifiers may be text or integer columns
pub(crate) fn identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match raw(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(D::Error::custom("missing or invalid identifier")),
    }
}

pub(crate) fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(raw(deserializer)?.as_ref().and_then(text).unwrap_or_default())
}

pub(crate) fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(raw(deserializer)?.as_ref().and_then(text))
}

/// `null`, non-arrays and non-string elements all collapse to the string subset
pub(crate) fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match raw(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Price is always a non-negative number; anything else becomes 0
pub(crate) fn price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(raw(deserializer)?
        .as_ref()
        .and_then(number)
        .filter(|p| *p >= 0.0)
        .unwrap_or(0.0))
}

pub(crate) fn optional_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    Ok(raw(deserializer)?.as_ref().and_then(number))
}

pub(crate) fn optional_integer<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Ok(raw(deserializer)?
        .as_ref()
        .and_then(number)
        .map(|n| n.round() as i64))
}

pub(crate) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match raw(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "t" | "1" | "yes"),
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    })
}

pub(crate) fn optional_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match raw(deserializer)? {
        Some(Value::String(s)) => timestamp(&s),
        _ => None,
    })
}

pub(crate) fn status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ListingStatus, D::Error> {
    Ok(match raw(deserializer)? {
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => ListingStatus::default(),
    })
}

pub(crate) fn source_type<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SourceType>, D::Error> {
    Ok(raw(deserializer)?
        .as_ref()
        .and_then(text)
        .map(|s| SourceType::from(s.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_accepts_numeric_strings() {
        assert_eq!(number(&json!(45)), Some(45.0));
        assert_eq!(number(&json!("12.50")), Some(12.5));
        assert_eq!(number(&json!(" $1,200.00 ")), Some(1200.0));
        assert_eq!(number(&json!("twelve")), None);
        assert_eq!(number(&json!(true)), None);
        assert_eq!(number(&Value::Null), None);
    }

    #[test]
    fn text_drops_blank_strings() {
        assert_eq!(text(&json!("  ")), None);
        assert_eq!(text(&json!(12)), Some("12".to_string()));
        assert_eq!(text(&json!("12 in")), Some("12 in".to_string()));
    }

    #[test]
    fn timestamp_accepts_gateway_formats() {
        let expected = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp("2024-03-01T10:00:00Z"), Some(expected));
        assert_eq!(timestamp("2024-03-01T10:00:00+00:00"), Some(expected));
        assert_eq!(timestamp("2024-03-01 10:00:00+00"), Some(expected));
        assert_eq!(timestamp("2024-03-01T10:00:00"), Some(expected));
        assert!(timestamp("2024-03-01").is_some());
        assert_eq!(timestamp("yesterday"), None);
    }
}
