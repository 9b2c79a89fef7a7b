use anyhow::{Context, Result};
use chrono::Utc;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::db::{connection::Database, helpers::format_datetime};

/// Path the station writes its latest reading to.
pub const LIVE_FEED_PATH: &str = "waterQuality";

/// Listener on the live-feed path.
///
/// Yields the value present at subscription time first, then every published
/// value in order. Dropping it releases the listener.
pub struct LiveSubscription {
    initial: Option<Value>,
    receiver: broadcast::Receiver<Value>,
}

impl LiveSubscription {
    /// Next full value of the path, or `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        if let Some(value) = self.initial.take() {
            return Some(value);
        }

        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("live subscriber lagged, {skipped} values skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Database {
    /// Overwrite the live-feed value and notify every subscriber.
    pub async fn publish_live(&self, payload: Value) -> Result<()> {
        let hub = self.live_sender();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO live_feed (path, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                params![LIVE_FEED_PATH, payload.to_string(), format_datetime(Utc::now())],
            )
            .context("failed to write live feed value")?;

            // Sent from the store thread so a concurrent subscribe sees either
            // the stored row or the notification, never both.
            let _ = hub.send(payload);
            Ok(())
        })
        .await
    }

    pub async fn current_live(&self) -> Result<Option<Value>> {
        self.execute(|conn| read_current(conn)).await
    }

    pub async fn subscribe_live(&self) -> Result<LiveSubscription> {
        let hub = self.live_sender();
        self.execute(move |conn| {
            let receiver = hub.subscribe();
            let initial = read_current(conn).context("failed to read current live value")?;
            Ok(LiveSubscription { initial, receiver })
        })
        .await
    }
}

fn read_current(conn: &Connection) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM live_feed WHERE path = ?1",
            params![LIVE_FEED_PATH],
            |row| row.get(0),
        )
        .optional()?;

    Ok(raw
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .filter(|value| !value.is_null()))
}
