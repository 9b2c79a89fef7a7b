//! Stand-in for a monitoring station: publishes plausible readings to the
//! live-feed path on a fixed cadence.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng};
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{db::Database, models::record::display_time};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub fn simulated_payload<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Value {
    json!({
        "timestamp": display_time(now),
        "temperature": round_to(rng.gen_range(28.0..29.5), 1),
        "turbidity": round_to(rng.gen_range(4.0..5.5), 2),
        "salinity": round_to(rng.gen_range(0.1..0.35), 2),
    })
}

pub async fn simulate_station(
    db: Database,
    every: Duration,
    cancel_token: CancellationToken,
    mut rng: StdRng,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payload = simulated_payload(&mut rng, Utc::now());
                if let Err(err) = db.publish_live(payload).await {
                    log_error!("simulated station failed to publish: {err:?}");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("simulated station shutting down");
                break;
            }
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
