use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_payload, to_i64},
    models::StoredItem,
};
use crate::models::HistoryEntry;

impl Database {
    /// Append under a freshly generated key. Returns the key.
    pub async fn append_history(&self, entry: &HistoryEntry) -> Result<String> {
        let payload =
            serde_json::to_string(entry).context("failed to serialize history entry")?;
        self.append_history_payload(payload).await
    }

    /// Append an arbitrary payload, as another writer of the collection might.
    pub async fn append_history_raw(&self, payload: &serde_json::Value) -> Result<String> {
        self.append_history_payload(payload.to_string()).await
    }

    async fn append_history_payload(&self, payload: String) -> Result<String> {
        self.execute(move |conn| {
            let key = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO history (key, payload, saved_at) VALUES (?1, ?2, ?3)",
                params![key, payload, format_datetime(Utc::now())],
            )
            .with_context(|| "failed to insert history entry")?;
            Ok(key)
        })
        .await
    }

    /// The `limit` most recent items by server order, oldest first.
    pub async fn fetch_recent_history(&self, limit: usize) -> Result<Vec<StoredItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, payload, saved_at
                 FROM history
                 ORDER BY saved_at DESC, seq DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![to_i64(limit)?])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                let payload: String = row.get(1)?;
                items.push(StoredItem {
                    key: row.get(0)?,
                    payload: parse_payload(&payload),
                    saved_at: parse_datetime(&row.get::<_, String>(2)?, "saved_at")?,
                });
            }

            items.reverse();
            Ok(items)
        })
        .await
    }

    pub async fn count_history(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
