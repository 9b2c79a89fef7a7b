//! A raw item of the history collection, as the store returns it.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{normalize_stored, WaterQualityRecord};

#[derive(Debug, Clone)]
pub struct StoredItem {
    /// Store-assigned key.
    pub key: String,
    pub payload: Value,
    /// Server-side write time; the ordering key for history queries.
    pub saved_at: DateTime<Utc>,
}

impl StoredItem {
    pub fn normalize(&self) -> WaterQualityRecord {
        normalize_stored(&self.key, &self.payload)
    }
}
