use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    db::{Database, LAST_SAVED_MARKER},
    metrics::{IngestOutcome, IngestionMetrics},
    models::{normalize_live, HistoryEntry, WaterQualityRecord},
    settings::LiveSettings,
};

use super::{
    gate::{PersistenceGate, Reservation},
    window::LiveWindow,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Result of handling one live notification.
pub struct Ingested {
    pub record: WaterQualityRecord,
    /// Present when the gate approved a durable write.
    pub write: Option<PendingWrite>,
}

/// A durable write running in the background.
pub struct PendingWrite {
    handle: JoinHandle<bool>,
}

impl PendingWrite {
    /// Wait for the write to settle; `true` if it reached history.
    pub async fn settled(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManualSave {
    Saved(WaterQualityRecord),
    NothingToSave,
    /// Another manual save is still in flight.
    AlreadySaving,
}

struct LiveState {
    window: LiveWindow,
    gate: PersistenceGate,
}

/// Owns the live window and the last-saved marker for one monitoring session.
#[derive(Clone)]
pub struct LiveBuffer {
    state: Arc<Mutex<LiveState>>,
    saving: Arc<AtomicBool>,
    db: Database,
    metrics: IngestionMetrics,
}

impl LiveBuffer {
    /// Build a buffer whose gate starts from the marker stored under
    /// [`LAST_SAVED_MARKER`]. An unreadable marker counts as "never saved".
    pub async fn open(db: Database, settings: &LiveSettings, metrics: IngestionMetrics) -> Self {
        let last_saved = match db.get_marker(LAST_SAVED_MARKER).await {
            Ok(marker) => marker,
            Err(err) => {
                log_warn!("could not read last-saved marker, starting fresh: {err:?}");
                None
            }
        };

        Self::with_marker(db, settings, metrics, last_saved)
    }

    pub fn with_marker(
        db: Database,
        settings: &LiveSettings,
        metrics: IngestionMetrics,
        last_saved: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(LiveState {
                window: LiveWindow::new(settings.window_capacity),
                gate: PersistenceGate::new(settings.save_interval(), last_saved),
            })),
            saving: Arc::new(AtomicBool::new(false)),
            db,
            metrics,
        }
    }

    /// Normalize, append to the window, and let the gate decide on a write.
    ///
    /// The write runs on its own task; the window is updated before this
    /// returns regardless of how long the store takes.
    pub async fn ingest(&self, payload: &Value, now: DateTime<Utc>) -> Ingested {
        let record = normalize_live(payload, now);

        let reservation = {
            let mut state = self.state.lock().await;
            let evicted = state.window.push(record.clone());
            if evicted > 0 {
                log_debug!("live window full, evicted {evicted} reading(s)");
            }
            state.gate.try_reserve(now)
        };

        let Some(reservation) = reservation else {
            self.metrics
                .record(now, &record.id, IngestOutcome::Throttled)
                .await;
            return Ingested {
                record,
                write: None,
            };
        };

        self.metrics
            .record(now, &record.id, IngestOutcome::Persisted)
            .await;
        let write = self.spawn_write(record.clone(), reservation);

        Ingested {
            record,
            write: Some(write),
        }
    }

    fn spawn_write(&self, record: WaterQualityRecord, reservation: Reservation) -> PendingWrite {
        let db = self.db.clone();
        let state = Arc::clone(&self.state);
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            match db.append_history(&HistoryEntry::from_live(&record)).await {
                Ok(key) => {
                    log_info!("persisted live reading {} as {key}", record.id);
                    store_marker(&db, reservation.at()).await;
                    true
                }
                Err(err) => {
                    log_error!("failed to persist live reading {}: {err:?}", record.id);
                    state.lock().await.gate.release(reservation);
                    metrics
                        .record(Utc::now(), &record.id, IngestOutcome::WriteFailed)
                        .await;
                    false
                }
            }
        });

        PendingWrite { handle }
    }

    /// Write the newest reading now, ignoring the interval.
    ///
    /// Re-entrant calls while a save is in flight return
    /// [`ManualSave::AlreadySaving`] without touching the store.
    pub async fn manual_save(&self) -> Result<ManualSave> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(ManualSave::AlreadySaving);
        }
        let _guard = SavingGuard(&self.saving);

        let latest = self.state.lock().await.window.latest().cloned();
        let Some(latest) = latest else {
            return Ok(ManualSave::NothingToSave);
        };

        let key = self
            .db
            .append_history(&HistoryEntry::from_live(&latest))
            .await
            .context("manual save failed")?;

        let saved_at = Utc::now();
        self.state.lock().await.gate.mark_saved(saved_at);
        store_marker(&self.db, saved_at).await;
        self.metrics
            .record(saved_at, &latest.id, IngestOutcome::ManualSave)
            .await;

        log_info!("manually saved live reading {} as {key}", latest.id);
        Ok(ManualSave::Saved(latest))
    }

    /// Window contents, oldest first.
    pub async fn snapshot(&self) -> Vec<WaterQualityRecord> {
        self.state.lock().await.window.to_vec()
    }

    pub async fn latest(&self) -> Option<WaterQualityRecord> {
        self.state.lock().await.window.latest().cloned()
    }

    pub async fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.gate.last_saved()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &IngestionMetrics {
        &self.metrics
    }
}

/// Clears the save-in-progress flag however the save ends.
struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The history row is already written; a lost marker only means the next
/// process start may persist one reading early.
async fn store_marker(db: &Database, at: DateTime<Utc>) {
    if let Err(err) = db.set_marker(LAST_SAVED_MARKER, at).await {
        log_warn!("failed to store last-saved marker: {err:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as TimeDelta, TimeZone};
    use serde_json::json;

    use crate::db::test_support::temp_database;

    fn settings(save_interval_secs: u64) -> LiveSettings {
        LiveSettings {
            window_capacity: 20,
            save_interval_secs,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 15, 8, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn reading(temperature: f64) -> Value {
        json!({ "temperature": temperature, "turbidity": "4.2", "salinity": 0.1 })
    }

    #[tokio::test]
    async fn writes_at_most_once_per_interval() {
        let (_dir, db) = temp_database();
        let buffer = LiveBuffer::with_marker(db.clone(), &settings(10), IngestionMetrics::new(), None);

        let mut written = Vec::new();
        for secs in [0, 5, 10, 15] {
            let ingested = buffer.ingest(&reading(secs as f64), at(secs)).await;
            if let Some(write) = ingested.write {
                assert!(write.settled().await);
                written.push(secs);
            }
        }

        assert_eq!(written, vec![0, 10]);
        assert_eq!(buffer.snapshot().await.len(), 4);
        assert_eq!(db.count_history().await.unwrap(), 2);
        assert_eq!(db.get_marker(LAST_SAVED_MARKER).await.unwrap(), Some(at(10)));

        let snapshot = buffer.metrics().get_snapshot().await;
        assert_eq!(snapshot.received_count, 4);
        assert_eq!(snapshot.persisted_count, 2);
        assert_eq!(snapshot.throttled_count, 2);
    }

    #[tokio::test]
    async fn durable_copy_omits_live_identifier() {
        let (_dir, db) = temp_database();
        let buffer = LiveBuffer::with_marker(db.clone(), &settings(10), IngestionMetrics::new(), None);

        let ingested = buffer.ingest(&reading(28.4), at(0)).await;
        assert!(ingested.record.id.starts_with("live_"));
        assert!(ingested.write.unwrap().settled().await);

        let items = db.fetch_recent_history(1).await.unwrap();
        assert!(items[0].payload.get("id").is_none());
        assert_eq!(items[0].normalize().id, items[0].key);
        assert_eq!(items[0].normalize().turbidity, 4.2);
    }

    #[tokio::test]
    async fn window_keeps_the_latest_readings() {
        let (_dir, db) = temp_database();
        let buffer = LiveBuffer::with_marker(db, &settings(3600), IngestionMetrics::new(), Some(at(0)));

        for secs in 1..=25 {
            buffer.ingest(&reading(secs as f64), at(secs)).await;
        }

        let window = buffer.snapshot().await;
        assert_eq!(window.len(), 20);
        assert_eq!(window.first().unwrap().temperature, 6.0);
        assert_eq!(window.last().unwrap().temperature, 25.0);
    }

    #[tokio::test]
    async fn open_resumes_from_stored_marker() {
        let (_dir, db) = temp_database();
        db.set_marker(LAST_SAVED_MARKER, at(100)).await.unwrap();

        let buffer = LiveBuffer::open(db, &settings(10), IngestionMetrics::new()).await;
        assert_eq!(buffer.last_saved().await, Some(at(100)));
        assert!(buffer.ingest(&reading(1.0), at(105)).await.write.is_none());
        assert!(buffer.ingest(&reading(1.0), at(110)).await.write.is_some());
    }

    #[tokio::test]
    async fn manual_save_while_in_flight_writes_once() {
        let (_dir, db) = temp_database();
        let buffer = LiveBuffer::with_marker(db.clone(), &settings(3600), IngestionMetrics::new(), Some(at(0)));
        buffer.ingest(&reading(29.0), at(1)).await;

        let (first, second) = tokio::join!(buffer.manual_save(), buffer.manual_save());

        assert!(matches!(first.unwrap(), ManualSave::Saved(_)));
        assert_eq!(second.unwrap(), ManualSave::AlreadySaving);
        assert_eq!(db.count_history().await.unwrap(), 1);
        assert!(!buffer.is_saving());
    }

    #[tokio::test]
    async fn manual_save_ignores_interval_and_moves_marker() {
        let (_dir, db) = temp_database();
        let buffer = LiveBuffer::with_marker(db.clone(), &settings(3600), IngestionMetrics::new(), Some(at(0)));
        buffer.ingest(&reading(29.0), at(1)).await;

        let before = Utc::now();
        assert!(matches!(buffer.manual_save().await.unwrap(), ManualSave::Saved(_)));
        assert!(matches!(buffer.manual_save().await.unwrap(), ManualSave::Saved(_)));

        assert_eq!(db.count_history().await.unwrap(), 2);
        assert!(buffer.last_saved().await.unwrap() >= before);
        assert_eq!(buffer.metrics().get_snapshot().await.manual_save_count, 2);
    }

    #[tokio::test]
    async fn manual_save_with_empty_window_does_nothing() {
        let (_dir, db) = temp_database();
        let buffer = LiveBuffer::with_marker(db.clone(), &settings(10), IngestionMetrics::new(), None);

        assert_eq!(buffer.manual_save().await.unwrap(), ManualSave::NothingToSave);
        assert_eq!(db.count_history().await.unwrap(), 0);
        assert_eq!(buffer.last_saved().await, None);
    }

    #[tokio::test]
    async fn stored_marker_matches_gate_when_saves_overlap() {
        let (_dir, db) = temp_database();
        let live_at = Utc::now();
        let marker = live_at - TimeDelta::seconds(60);
        let buffer = LiveBuffer::with_marker(db.clone(), &settings(10), IngestionMetrics::new(), Some(marker));
        assert!(buffer
            .ingest(&reading(28.0), marker + TimeDelta::seconds(1))
            .await
            .write
            .is_none());

        let concurrent = reading(28.5);
        let (saved, ingested) = tokio::join!(
            buffer.manual_save(),
            buffer.ingest(&concurrent, live_at)
        );
        assert!(matches!(saved.unwrap(), ManualSave::Saved(_)));
        assert!(ingested.write.unwrap().settled().await);

        let in_memory = buffer.last_saved().await.unwrap();
        assert!(in_memory >= live_at);
        let stored = db.get_marker(LAST_SAVED_MARKER).await.unwrap().unwrap();
        assert_eq!(stored.timestamp_micros(), in_memory.timestamp_micros());
        assert_eq!(db.count_history().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_write_releases_the_slot() {
        let (_dir, db) = temp_database();
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE history")?;
            Ok(())
        })
        .await
        .unwrap();
        let buffer = LiveBuffer::with_marker(db, &settings(10), IngestionMetrics::new(), Some(at(0)));

        let ingested = buffer.ingest(&reading(28.0), at(10)).await;
        assert!(!ingested.write.unwrap().settled().await);

        assert_eq!(buffer.last_saved().await, Some(at(0)));
        let snapshot = buffer.metrics().get_snapshot().await;
        assert_eq!(snapshot.write_failure_count, 1);
        assert_eq!(snapshot.persisted_count, 0);
        assert_eq!(snapshot.received_count, 1);

        assert!(buffer.ingest(&reading(28.1), at(11)).await.write.is_some());
        assert_eq!(buffer.snapshot().await.len(), 2);
    }
}
