use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Fixed-width UTC rendering so stored timestamps sort lexicographically.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Stored payloads are written by whoever owns the path; anything that is not
/// a JSON object reads back as an empty one.
pub fn parse_payload(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("value {value} exceeds SQLite INTEGER range"))
}
