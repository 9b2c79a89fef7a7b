use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;

use crate::{
    dashboard::{metric_cards, DashboardSummary, MetricStats},
    models::{HistoryEntry, WaterQualityRecord},
    AppState,
};

use super::{import_file, load_history, sample_records};

/// Rows printed under the summary.
const TABLE_ROWS: usize = 20;

#[derive(Debug, Default)]
pub struct DashboardOptions {
    pub limit: Option<usize>,
    pub imports: Vec<PathBuf>,
    pub persist: bool,
    pub sample: bool,
    pub json: bool,
}

pub async fn show_dashboard(state: &AppState, options: DashboardOptions) -> Result<()> {
    let limit = options.limit.unwrap_or(state.settings.history().limit);

    let mut added = Vec::new();
    if options.sample {
        added.extend(sample_records());
    }
    for path in &options.imports {
        added.extend(import_file(path)?);
    }

    if options.persist {
        for record in &added {
            state
                .db
                .append_history(&HistoryEntry::from_record(record))
                .await
                .with_context(|| format!("failed to persist record {}", record.id))?;
        }
        println!("Persisted {} record(s) to history.", added.len());
    }

    // Sample data stands in for history rather than adding to it.
    let mut records = if options.sample && !options.persist {
        Vec::new()
    } else {
        load_history(&state.db, limit).await
    };
    if !options.persist {
        records.extend(added);
    }

    let summary = DashboardSummary::from_records(&records);

    if options.json {
        let document = json!({ "summary": summary, "records": records });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    print_dashboard(&summary, &records);
    Ok(())
}

fn print_dashboard(summary: &DashboardSummary, records: &[WaterQualityRecord]) {
    println!("Stations ({})", summary.count);

    let Some(latest) = summary.latest.as_ref() else {
        println!("No data yet. Run with --sample to load demonstration data for this station.");
        return;
    };

    println!();
    for card in metric_cards(latest) {
        println!("  {:<12} {:>8} {}", card.title, card.value, card.unit);
    }

    println!();
    print_stats("Temperature", "°C", summary.temperature);
    print_stats("Turbidity", "NTU", summary.turbidity);
    print_stats("Salinity", "ppt", summary.salinity);

    println!();
    println!(
        "  {:<38} {:<20} {:>8} {:>8} {:>8}",
        "id", "timestamp", "temp", "turb", "sal"
    );
    let start = records.len().saturating_sub(TABLE_ROWS);
    for record in &records[start..] {
        println!(
            "  {:<38} {:<20} {:>8.1} {:>8.2} {:>8.2}",
            record.id, record.timestamp, record.temperature, record.turbidity, record.salinity
        );
    }
}

fn print_stats(title: &str, unit: &str, stats: Option<MetricStats>) {
    if let Some(stats) = stats {
        println!(
            "  {:<12} avg {:.1} {unit}  min {:.1}  max {:.1}",
            title, stats.average, stats.min, stats.max
        );
    }
}
