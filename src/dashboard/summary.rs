//! Figures behind the dashboard cards and the assistant's data summary.

use serde::Serialize;

use crate::models::WaterQualityRecord;

/// One headline value as the dashboard shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub title: &'static str,
    pub value: String,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        (count > 0).then(|| Self {
            average: sum / count as f64,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub count: usize,
    pub latest: Option<WaterQualityRecord>,
    pub temperature: Option<MetricStats>,
    pub turbidity: Option<MetricStats>,
    pub salinity: Option<MetricStats>,
}

impl DashboardSummary {
    pub fn from_records(records: &[WaterQualityRecord]) -> Self {
        Self {
            count: records.len(),
            latest: records.last().cloned(),
            temperature: MetricStats::from_values(records.iter().map(|r| r.temperature)),
            turbidity: MetricStats::from_values(records.iter().map(|r| r.turbidity)),
            salinity: MetricStats::from_values(records.iter().map(|r| r.salinity)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Temperature, turbidity and salinity cards for `record`, one decimal each.
pub fn metric_cards(record: &WaterQualityRecord) -> [MetricCard; 3] {
    [
        MetricCard {
            title: "Temperature",
            value: format!("{:.1}", record.temperature),
            unit: "°C",
        },
        MetricCard {
            title: "Turbidity",
            value: format!("{:.1}", record.turbidity),
            unit: "NTU",
        },
        MetricCard {
            title: "Salinity",
            value: format!("{:.1}", record.salinity),
            unit: "ppt",
        },
    ]
}
