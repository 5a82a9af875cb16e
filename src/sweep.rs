//! Background eviction of idle participants.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{clock, messages::log, participants::presence, AppResult};

/// One pass: evicts everyone idle for `idle_timeout` as of `now` and posts their leave
/// notices as one batch. Leave notices skip the sender check since the senders are gone.
pub async fn sweep_once(
    db_pool: &SqlitePool,
    now: i64,
    idle_timeout: Duration,
) -> AppResult<Vec<String>> {
    let evicted = presence::sweep_stale(db_pool, now, idle_timeout).await?;
    if evicted.is_empty() {
        return Ok(evicted);
    }

    log::announce(db_pool, &evicted, log::LEAVE_NOTICE).await?;
    for name in &evicted {
        tracing::info!(name = %name, "participant timed out");
    }

    Ok(evicted)
}

/// Runs [`sweep_once`] every `interval` until the task is aborted. A failed pass is logged
/// and the schedule carries on.
pub fn spawn(db_pool: SqlitePool, interval: Duration, idle_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&db_pool, clock::now_millis(), idle_timeout).await {
                tracing::warn!(error = %err, "sweep pass failed");
            }
        }
    })
}
