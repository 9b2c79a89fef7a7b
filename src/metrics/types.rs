use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestOutcome {
    /// Appended to the window, gate rejected the write.
    Throttled,
    /// Appended and handed to a durable write.
    Persisted,
    /// The durable write failed; the gate reservation was released.
    WriteFailed,
    /// Operator-forced save of the latest reading.
    ManualSave,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEvent {
    pub at: DateTime<Utc>,
    pub record_id: String,
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub received_count: u64,
    pub persisted_count: u64,
    pub throttled_count: u64,
    pub write_failure_count: u64,
    pub manual_save_count: u64,
    pub recent_events: Vec<IngestEvent>,
}
