use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::db::LiveSubscription;

use super::buffer::LiveBuffer;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Single consumer of the live feed: one notification is fully handled before
/// the next is pulled, so the window and the marker never race.
pub async fn live_loop(
    mut subscription: LiveSubscription,
    buffer: LiveBuffer,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("live loop shutting down");
                break;
            }
            next = subscription.recv() => {
                let Some(payload) = next else {
                    log_warn!("live feed closed, stopping live loop");
                    break;
                };

                if payload.is_null() {
                    continue;
                }

                let ingested = buffer.ingest(&payload, Utc::now()).await;
                log_debug!(
                    "live reading {} (t={:.1} turb={:.2} sal={:.2}) persisted={}",
                    ingested.record.id,
                    ingested.record.temperature,
                    ingested.record.turbidity,
                    ingested.record.salinity,
                    ingested.write.is_some()
                );
            }
        }
    }
}
