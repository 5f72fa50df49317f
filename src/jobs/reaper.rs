//! TTL reaper for terminal jobs.
//!
//! Job rows are a polling surface, not an archive: once a caller has had
//! a reasonable window to fetch the outcome, the row goes away. The pack
//! directory on disk is untouched — the manifest is the durable record.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::jobs::queue::delete_expired;

const REAP_INTERVAL_SECS: u64 = 300;

/// Periodically delete succeeded/failed jobs older than `ttl_secs`.
pub async fn run_reaper(pool: PgPool, ttl_secs: u64, cancel: CancellationToken) {
    info!(ttl_secs, "Job reaper started");

    let mut interval = tokio::time::interval(Duration::from_secs(REAP_INTERVAL_SECS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Job reaper stopping");
                break;
            }
            _ = interval.tick() => {
                match delete_expired(&pool, ttl_secs).await {
                    Ok(0) => {}
                    Ok(n) => info!(deleted = n, "Reaped expired jobs"),
                    Err(e) => error!(error = %e, "Job reaping failed"),
                }
            }
        }
    }
}
