pub mod assistant;
pub mod dashboard;
pub mod db;
pub mod history;
pub mod live;
pub mod metrics;
pub mod models;
pub mod settings;
mod utils;

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use db::Database;
use settings::SettingsStore;

use assistant::commands::{ask_once, run_chat};
use history::commands::{show_dashboard, DashboardOptions};
use live::commands::{run_live, LiveOptions};

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
}

#[derive(Debug, Parser)]
#[command(name = "aquawatch", version, about = "Water-quality monitoring for a single station")]
pub struct Cli {
    /// Directory holding the SQLite store and settings.json.
    #[arg(
        long,
        global = true,
        env = "AQUAWATCH_DATA_DIR",
        default_value = "aquawatch-data"
    )]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize stored history.
    Dashboard {
        /// Most recent records to load (defaults to the history.limit setting).
        #[arg(long)]
        limit: Option<usize>,
        /// Workbook (.xlsx, .xls, .ods) or delimited text export to add to the view.
        #[arg(long = "import", value_name = "FILE")]
        imports: Vec<PathBuf>,
        /// Write imported (and sample) records to history.
        #[arg(long)]
        persist: bool,
        /// Show the demonstration data set.
        #[arg(long)]
        sample: bool,
        #[arg(long)]
        json: bool,
    },
    /// Follow live readings and persist them on the save interval.
    Live {
        /// Publish simulated station readings.
        #[arg(long)]
        simulate: bool,
        #[arg(long, default_value_t = 2000, value_name = "MS")]
        simulate_every_ms: u64,
    },
    /// Ask the assistant one question over stored history.
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Chat with the assistant.
    Chat {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Show settings, updating any that are given.
    Settings {
        #[arg(long)]
        save_interval_secs: Option<u64>,
        #[arg(long)]
        window_capacity: Option<usize>,
        #[arg(long)]
        history_limit: Option<usize>,
        #[arg(long)]
        model: Option<String>,
    },
}

pub fn run() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level; AQUAWATCH_DEBUG=1 lowers it to debug.
    let debug_mode = std::env::var("AQUAWATCH_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    env_logger::Builder::new()
        .filter_level(if debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    log::info!("AquaWatch starting up (data dir {})...", cli.data_dir.display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("failed to create {}", cli.data_dir.display()))?;

    let state = AppState {
        db: Database::new(cli.data_dir.join("aquawatch.sqlite3"))?,
        settings: SettingsStore::new(cli.data_dir.join("settings.json"))?,
    };

    match cli.command {
        Command::Dashboard {
            limit,
            imports,
            persist,
            sample,
            json,
        } => {
            show_dashboard(
                &state,
                DashboardOptions {
                    limit,
                    imports,
                    persist,
                    sample,
                    json,
                },
            )
            .await
        }
        Command::Live {
            simulate,
            simulate_every_ms,
        } => {
            run_live(
                &state,
                LiveOptions {
                    simulate,
                    simulate_every: Duration::from_millis(simulate_every_ms.max(1)),
                },
            )
            .await
        }
        Command::Ask {
            prompt,
            limit,
            api_key,
        } => ask_once(&state, &prompt.join(" "), limit, api_key).await,
        Command::Chat { limit, api_key } => run_chat(&state, limit, api_key).await,
        Command::Settings {
            save_interval_secs,
            window_capacity,
            history_limit,
            model,
        } => {
            let changed = save_interval_secs.is_some()
                || window_capacity.is_some()
                || history_limit.is_some()
                || model.is_some();

            let current = if changed {
                state.settings.update(|settings| {
                    if let Some(secs) = save_interval_secs {
                        settings.live.save_interval_secs = secs;
                    }
                    if let Some(capacity) = window_capacity {
                        settings.live.window_capacity = capacity.max(1);
                    }
                    if let Some(limit) = history_limit {
                        settings.history.limit = limit;
                    }
                    if let Some(model) = model {
                        settings.assistant.model = model;
                    }
                })?
            } else {
                state.settings.snapshot()
            };

            println!("{}", serde_json::to_string_pretty(&current)?);
            Ok(())
        }
    }
}
