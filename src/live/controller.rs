use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{db::Database, metrics::IngestionMetrics, settings::LiveSettings};

use super::{buffer::LiveBuffer, loop_worker::live_loop};

/// Mounts and unmounts the live view: one subscription, one consumer task.
pub struct LiveController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    buffer: Option<LiveBuffer>,
}

impl LiveController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            buffer: None,
        }
    }

    pub async fn start(
        &mut self,
        db: Database,
        settings: &LiveSettings,
        metrics: IngestionMetrics,
    ) -> Result<LiveBuffer> {
        if self.handle.is_some() {
            bail!("live monitor already active");
        }

        let subscription = db
            .subscribe_live()
            .await
            .context("failed to subscribe to live feed")?;
        let buffer = LiveBuffer::open(db, settings, metrics).await;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(live_loop(
            subscription,
            buffer.clone(),
            cancel_token.clone(),
        ));

        info!(
            "live monitor started (window={}, save interval={}s)",
            settings.window_capacity, settings.save_interval_secs
        );

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.buffer = Some(buffer.clone());
        Ok(buffer)
    }

    pub fn buffer(&self) -> Option<&LiveBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancel the consumer and wait for it. Once this returns no further
    /// notification is handled; writes already in flight still settle.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        self.buffer = None;

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("live loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for LiveController {
    fn default() -> Self {
        Self::new()
    }
}
