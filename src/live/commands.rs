use std::time::Duration;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::{
    dashboard::metric_cards,
    db::Database,
    metrics::IngestionMetrics,
    models::record::display_time,
    AppState,
};

use super::{
    buffer::{LiveBuffer, ManualSave},
    controller::LiveController,
    simulator::simulate_station,
};

const ENABLE_LOGS: bool = true;

use crate::log_error;

const HELP: &str = "Commands: paste a JSON reading to publish it, `save` to save the latest reading now, \
`status` to show the window, `quit` to stop.";

#[derive(Debug)]
pub struct LiveOptions {
    pub simulate: bool,
    pub simulate_every: Duration,
}

enum LineAction {
    Continue,
    Quit,
}

/// Interactive live monitor. Readings come from stdin JSON lines and, when
/// requested, a simulated station.
pub async fn run_live(state: &AppState, options: LiveOptions) -> Result<()> {
    let metrics = IngestionMetrics::new();
    let mut controller = LiveController::new();
    let buffer = controller
        .start(state.db.clone(), &state.settings.live(), metrics.clone())
        .await?;

    let station_token = CancellationToken::new();
    let station = options.simulate.then(|| {
        tokio::spawn(simulate_station(
            state.db.clone(),
            options.simulate_every,
            station_token.clone(),
            StdRng::from_entropy(),
        ))
    });

    println!("Live monitor started. {HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if let LineAction::Quit = handle_line(&state.db, &buffer, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    station_token.cancel();
    if let Some(handle) = station {
        if let Err(err) = handle.await {
            log_error!("simulated station task failed: {err:?}");
        }
    }
    controller.stop().await?;

    print_metrics(&metrics).await;
    Ok(())
}

async fn handle_line(db: &Database, buffer: &LiveBuffer, line: &str) -> LineAction {
    match line {
        "" => {}
        "quit" | "exit" => return LineAction::Quit,
        "save" => spawn_manual_save(buffer.clone()),
        "status" => {
            print_status(buffer).await;
            print_metrics(buffer.metrics()).await;
        }
        "help" => println!("{HELP}"),
        json if json.starts_with('{') => match serde_json::from_str::<Value>(json) {
            Ok(payload) => {
                if let Err(err) = db.publish_live(payload).await {
                    println!("Could not publish reading: {err:#}");
                }
            }
            Err(err) => println!("Not a JSON object: {err}"),
        },
        _ => println!("{HELP}"),
    }
    LineAction::Continue
}

/// Runs off the input loop so a second `save` during a slow write is seen
/// as already in progress.
fn spawn_manual_save(buffer: LiveBuffer) {
    tokio::spawn(async move {
        match buffer.manual_save().await {
            Ok(ManualSave::Saved(record)) => println!(
                "Saved reading from {} (temperature {:.1}°C).",
                record.timestamp, record.temperature
            ),
            Ok(ManualSave::NothingToSave) => println!("No reading to save yet."),
            Ok(ManualSave::AlreadySaving) => println!("A save is already in progress."),
            Err(err) => println!("Save failed: {err:#}"),
        }
    });
}

async fn print_status(buffer: &LiveBuffer) {
    let window = buffer.snapshot().await;
    let last_saved = buffer
        .last_saved()
        .await
        .map(display_time)
        .unwrap_or_else(|| "never".to_string());

    println!(
        "Window: {} reading(s). Last saved: {last_saved}.{}",
        window.len(),
        if buffer.is_saving() { " Saving..." } else { "" }
    );

    match window.last() {
        Some(latest) => {
            for card in metric_cards(latest) {
                println!("  {:<12} {:>8} {}", card.title, card.value, card.unit);
            }
        }
        None => println!("  Waiting for the first reading."),
    }
}

async fn print_metrics(metrics: &IngestionMetrics) {
    let snapshot = metrics.get_snapshot().await;
    println!(
        "Received {} reading(s): {} persisted, {} throttled, {} failed writes, {} manual saves.",
        snapshot.received_count,
        snapshot.persisted_count,
        snapshot.throttled_count,
        snapshot.write_failure_count,
        snapshot.manual_save_count
    );
}
