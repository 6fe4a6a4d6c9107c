//! Background maintenance tasks
//!
//! Currently a single periodic job: deactivating expired-but-still-active
//! verification records in bounded batches.

use crate::db::verification_repo;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often the verification sweep runs (hourly)
const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Spawn the hourly verification expiry sweep.
///
/// The run guard keeps overlapping executions from double-processing a
/// batch; a single in-process guard is sufficient here, no cross-process
/// coordination is required.
pub fn spawn_verification_sweeper(pool: PgPool) -> tokio::task::JoinHandle<()> {
    let running = AtomicBool::new(false);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        // The first tick fires immediately; skip it so startup traffic is
        // not competing with a sweep.
        interval.tick().await;

        loop {
            interval.tick().await;

            if running.swap(true, Ordering::SeqCst) {
                tracing::warn!("verification sweep still running; skipping this interval");
                continue;
            }

            match verification_repo::expire_stale(&pool).await {
                Ok(0) => {}
                Ok(affected) => {
                    tracing::info!(affected, "deactivated expired verification records")
                }
                Err(err) => tracing::error!(error = %err, "verification sweep failed"),
            }

            running.store(false, Ordering::SeqCst);
        }
    })
}
