use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
};

/// Well-known key of the last-saved marker.
pub const LAST_SAVED_MARKER: &str = "lastSavedAt";

impl Database {
    pub async fn get_marker(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM markers WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            value.map(|raw| parse_datetime(&raw, &key)).transpose()
        })
        .await
    }

    /// Store `value` under `key` unless an equal or later time is already
    /// there. Timestamps are fixed-width RFC 3339 in UTC, so text order is
    /// time order.
    pub async fn set_marker(&self, key: &str, value: DateTime<Utc>) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO markers (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                 WHERE excluded.value > markers.value",
                params![key, format_datetime(value), format_datetime(Utc::now())],
            )
            .with_context(|| format!("failed to write marker {key}"))?;
            Ok(())
        })
        .await
    }
}
