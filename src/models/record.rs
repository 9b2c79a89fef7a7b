//! Water-quality record model and the normalization rules for raw payloads.
//!
//! Stored items and live-feed values arrive as loosely typed JSON: numbers may
//! be strings, fields may be missing. Everything funnels through the helpers
//! here so the rest of the crate only ever sees [`WaterQualityRecord`].

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamp used for stored items that carry none.
pub const MISSING_TIMESTAMP: &str = "N/A";

/// Prefix of identifiers synthesized for live readings without one.
pub const LIVE_ID_PREFIX: &str = "live_";

/// A single water-quality observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterQualityRecord {
    pub id: String,
    pub timestamp: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// NTU, as reported by the station.
    pub turbidity: f64,
    /// Parts per thousand.
    pub salinity: f64,
}

/// The durable form written to history.
///
/// Live writes leave `id` empty: the store assigns its own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: String,
    pub temperature: f64,
    pub turbidity: f64,
    pub salinity: f64,
}

impl HistoryEntry {
    /// Durable copy of a live reading, without the live-assigned identifier.
    pub fn from_live(record: &WaterQualityRecord) -> Self {
        Self {
            id: None,
            timestamp: record.timestamp.clone(),
            temperature: record.temperature,
            turbidity: record.turbidity,
            salinity: record.salinity,
        }
    }

    /// Durable copy that keeps the record's own identifier (imports, sample data).
    pub fn from_record(record: &WaterQualityRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            ..Self::from_live(record)
        }
    }
}

/// Normalize an item read from the history collection.
pub fn normalize_stored(key: &str, payload: &Value) -> WaterQualityRecord {
    WaterQualityRecord {
        id: text_field(payload, "id").unwrap_or_else(|| key.to_string()),
        timestamp: text_field(payload, "timestamp")
            .unwrap_or_else(|| MISSING_TIMESTAMP.to_string()),
        temperature: numeric_field(payload, "temperature"),
        turbidity: numeric_field(payload, "turbidity"),
        salinity: numeric_field(payload, "salinity"),
    }
}

/// Normalize a value pushed on the live feed, received at `now`.
pub fn normalize_live(payload: &Value, now: DateTime<Utc>) -> WaterQualityRecord {
    WaterQualityRecord {
        id: text_field(payload, "id").unwrap_or_else(|| live_id(now)),
        timestamp: text_field(payload, "timestamp").unwrap_or_else(|| display_time(now)),
        temperature: numeric_field(payload, "temperature"),
        turbidity: numeric_field(payload, "turbidity"),
        salinity: numeric_field(payload, "salinity"),
    }
}

pub fn live_id(now: DateTime<Utc>) -> String {
    format!("{LIVE_ID_PREFIX}{}", now.timestamp_millis())
}

/// Local wall-clock time as shown next to live readings.
pub fn display_time(now: DateTime<Utc>) -> String {
    now.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Lenient float coercion: numbers pass through, strings are parsed up to the
/// first character that cannot continue a decimal literal, everything else is 0.
pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_leading_float(text),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn numeric_field(payload: &Value, field: &str) -> f64 {
    payload.get(field).map(coerce_f64).unwrap_or(0.0)
}

fn text_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_leading_float(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => {
                // Only consume the exponent when digits follow it.
                let mut lookahead = end + 1;
                if matches!(bytes.get(lookahead), Some(b'+') | Some(b'-')) {
                    lookahead += 1;
                }
                if !matches!(bytes.get(lookahead), Some(b'0'..=b'9')) {
                    break;
                }
                seen_exp = true;
                end = lookahead;
            }
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }

    trimmed[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let record = normalize_stored("-Nabc", &json!({ "timestamp": "2025-10-15" }));
        assert_eq!(record.id, "-Nabc");
        assert_eq!(record.temperature, 0.0);
        assert_eq!(record.turbidity, 0.0);
        assert_eq!(record.salinity, 0.0);
    }

    #[test]
    fn stored_item_without_timestamp_gets_sentinel() {
        let record = normalize_stored("k1", &json!({ "temperature": 28.5 }));
        assert_eq!(record.timestamp, MISSING_TIMESTAMP);
        assert_eq!(record.temperature, 28.5);
    }

    #[test]
    fn stored_id_wins_over_key() {
        let record = normalize_stored("k1", &json!({ "id": 7, "salinity": "0.3" }));
        assert_eq!(record.id, "7");
        assert_eq!(record.salinity, 0.3);
    }

    #[test]
    fn empty_id_falls_back() {
        let record = normalize_stored("k9", &json!({ "id": "" }));
        assert_eq!(record.id, "k9");
    }

    #[test]
    fn non_object_payload_is_all_defaults() {
        let record = normalize_stored("k", &json!("garbage"));
        assert_eq!(record.temperature, 0.0);
        assert_eq!(record.timestamp, MISSING_TIMESTAMP);
    }

    #[test]
    fn live_reading_gets_synthesized_id() {
        let now = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        let record = normalize_live(&json!({ "temperature": "29.1" }), now);
        assert_eq!(record.id, "live_1760000000123");
        assert_eq!(record.temperature, 29.1);
        assert_eq!(record.timestamp, display_time(now));
    }

    #[test]
    fn coercion_parses_leading_number() {
        assert_eq!(coerce_f64(&json!("12.5 NTU")), 12.5);
        assert_eq!(coerce_f64(&json!("  -3.25")), -3.25);
        assert_eq!(coerce_f64(&json!("1e3x")), 1000.0);
        assert_eq!(coerce_f64(&json!("4e")), 4.0);
        assert_eq!(coerce_f64(&json!(".5")), 0.5);
    }

    #[test]
    fn coercion_rejects_garbage() {
        assert_eq!(coerce_f64(&json!("abc")), 0.0);
        assert_eq!(coerce_f64(&json!("")), 0.0);
        assert_eq!(coerce_f64(&json!("-")), 0.0);
        assert_eq!(coerce_f64(&json!(true)), 0.0);
        assert_eq!(coerce_f64(&json!(null)), 0.0);
        assert_eq!(coerce_f64(&json!([1.0])), 0.0);
    }

    #[test]
    fn live_entry_drops_identifier() {
        let record = WaterQualityRecord {
            id: "live_1".into(),
            timestamp: "10:00:00".into(),
            temperature: 28.0,
            turbidity: 4.0,
            salinity: 0.2,
        };
        let entry = HistoryEntry::from_live(&record);
        let encoded = serde_json::to_value(&entry).unwrap();
        assert!(encoded.get("id").is_none());
        assert_eq!(encoded["timestamp"], "10:00:00");
    }
}
