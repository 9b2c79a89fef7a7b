//! The monitoring store: one SQLite file holding the history collection, the
//! last-saved marker and the live-feed path.
//!
//! SQLite connections are not shared across threads, so the connection lives
//! on a dedicated `aquawatch-db` thread and every read or write is shipped to
//! it as a closure. Closures run one at a time in the order they were sent,
//! which is what keeps a live publish and its fan-out in the same order as
//! the rows they wrote.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use super::migrations::run_migrations;

/// Buffered live-feed values per subscriber before it starts lagging.
const LIVE_FEED_CAPACITY: usize = 256;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(StoreTask),
    Close,
}

struct StoreHandle {
    commands: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    live_hub: broadcast::Sender<Value>,
}

impl Drop for StoreHandle {
    /// The last `Database` clone going away closes the SQLite file; queued
    /// history writes still run before the thread exits.
    fn drop(&mut self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let Some(worker) = worker else {
            return;
        };
        if let Err(err) = self.commands.send(StoreCommand::Close) {
            error!("store thread already gone before close: {err}");
        }
        if let Err(err) = worker.join() {
            error!("store thread panicked: {err:?}");
        }
    }
}

/// Handle to the monitoring store shared by the loader, the live buffer and
/// the CLI commands. Clones share the worker thread and the live-feed hub.
#[derive(Clone)]
pub struct Database {
    inner: Arc<StoreHandle>,
    db_path: Arc<PathBuf>,
}

impl Database {
    /// Open (or create) the store at `db_path` and bring its schema up to
    /// date. Returns once migrations have run on the worker thread.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (commands, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("aquawatch-db".into())
            .spawn(move || run_store_worker(&path_for_thread, command_rx, ready_tx))
            .context("failed to spawn store thread")?;

        ready_rx
            .recv()
            .context("store thread exited before it was ready")??;

        info!("monitoring store ready at {}", db_path.display());

        let (live_hub, _) = broadcast::channel(LIVE_FEED_CAPACITY);

        Ok(Self {
            inner: Arc::new(StoreHandle {
                commands,
                worker: Mutex::new(Some(worker)),
                live_hub,
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Run `task` against the store connection and hand back its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Run(Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("store caller went away before its result arrived");
            }
        }));

        self.inner
            .commands
            .send(command)
            .map_err(|err| anyhow!("store thread is not accepting work: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread stopped while running a task"))?
    }

    /// Fan-out side of the live-feed path. Only sent to from store tasks so
    /// notifications follow the order of the rows written.
    pub(crate) fn live_sender(&self) -> broadcast::Sender<Value> {
        self.inner.live_hub.clone()
    }
}

fn run_store_worker(
    path: &Path,
    commands: mpsc::Receiver<StoreCommand>,
    ready: mpsc::Sender<Result<()>>,
) {
    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(
                anyhow::Error::new(err).context("failed to open SQLite database")
            ));
            return;
        }
    };

    // WAL lets a second process read history while the live monitor writes.
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("failed to enable WAL mode: {err}");
    }

    let migrated = run_migrations(&mut conn).context("failed to run database migrations");
    let failed = migrated.is_err();
    if ready.send(migrated).is_err() || failed {
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            StoreCommand::Run(task) => task(&mut conn),
            StoreCommand::Close => break,
        }
    }

    info!("store thread shutting down");
}
