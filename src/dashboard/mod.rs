mod summary;

pub use summary::{metric_cards, DashboardSummary, MetricCard, MetricStats};
