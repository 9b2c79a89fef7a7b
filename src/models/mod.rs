pub mod chat;
pub mod record;

pub use chat::{ChatMessage, ChatRole};
pub use record::{
    coerce_f64, normalize_live, normalize_stored, HistoryEntry, WaterQualityRecord,
};
