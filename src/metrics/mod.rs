mod types;

pub use types::{IngestEvent, IngestOutcome, MetricsSnapshot};

use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

const MAX_RECENT_EVENTS: usize = 20;

/// Counters for the live ingestion path. Clones share the same state.
#[derive(Clone, Default)]
pub struct IngestionMetrics {
    inner: Arc<Mutex<MetricsState>>,
}

#[derive(Default)]
struct MetricsState {
    recent_events: VecDeque<IngestEvent>,
    received_count: u64,
    persisted_count: u64,
    throttled_count: u64,
    write_failure_count: u64,
    manual_save_count: u64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, at: DateTime<Utc>, record_id: &str, outcome: IngestOutcome) {
        let mut state = self.inner.lock().await;

        match outcome {
            IngestOutcome::Throttled => {
                state.received_count += 1;
                state.throttled_count += 1;
            }
            IngestOutcome::Persisted => {
                state.received_count += 1;
                state.persisted_count += 1;
            }
            // Follow-ups of an earlier event; the reading was already counted.
            IngestOutcome::WriteFailed => {
                state.persisted_count = state.persisted_count.saturating_sub(1);
                state.write_failure_count += 1;
            }
            IngestOutcome::ManualSave => state.manual_save_count += 1,
        }

        state.recent_events.push_back(IngestEvent {
            at,
            record_id: record_id.to_string(),
            outcome,
        });

        if state.recent_events.len() > MAX_RECENT_EVENTS {
            state.recent_events.pop_front();
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock().await;

        MetricsSnapshot {
            received_count: state.received_count,
            persisted_count: state.persisted_count,
            throttled_count: state.throttled_count,
            write_failure_count: state.write_failure_count,
            manual_save_count: state.manual_save_count,
            recent_events: state.recent_events.iter().cloned().collect(),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = MetricsState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_writes_are_not_counted_as_persisted() {
        let metrics = IngestionMetrics::new();
        let now = Utc::now();

        metrics.record(now, "a", IngestOutcome::Persisted).await;
        metrics.record(now, "b", IngestOutcome::Throttled).await;
        metrics.record(now, "a", IngestOutcome::WriteFailed).await;

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.received_count, 2);
        assert_eq!(snapshot.persisted_count, 0);
        assert_eq!(snapshot.throttled_count, 1);
        assert_eq!(snapshot.write_failure_count, 1);
        assert_eq!(snapshot.recent_events.len(), 3);
    }

    #[tokio::test]
    async fn recent_events_are_bounded() {
        let metrics = IngestionMetrics::new();
        for i in 0..(MAX_RECENT_EVENTS + 5) {
            metrics
                .record(Utc::now(), &format!("r{i}"), IngestOutcome::Throttled)
                .await;
        }

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.recent_events.len(), MAX_RECENT_EVENTS);
        assert_eq!(snapshot.recent_events[0].record_id, "r5");

        metrics.reset().await;
        assert_eq!(metrics.get_snapshot().await.received_count, 0);
    }
}
