//! Participant lifecycle: join, heartbeat, idle eviction.
//!
//! Every check here is a read followed by a separate write with no locking, so two racing
//! joins under one name, or a heartbeat racing the sweep, can interleave. The primary key on
//! `participants.name` turns the losing join into a conflict.

use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::{clock, messages::log, AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    /// Epoch millis of the last join or heartbeat
    pub last_status: i64,
}

pub fn check_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name must not be blank".to_owned()));
    }
    Ok(())
}

pub async fn find(db_pool: &SqlitePool, name: &str) -> AppResult<Option<Participant>> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT name,last_status FROM participants WHERE name=?")
            .bind(name)
            .fetch_optional(db_pool)
            .await?;

    Ok(row.map(|(name, last_status)| Participant { name, last_status }))
}

pub async fn list(db_pool: &SqlitePool) -> AppResult<Vec<Participant>> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name,last_status FROM participants")
        .fetch_all(db_pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(name, last_status)| Participant { name, last_status })
        .collect())
}

/// Adds `name` to the room and announces it. The announcement is best effort: once the
/// participant row is in, a failed notice is only logged.
pub async fn register(db_pool: &SqlitePool, name: &str) -> AppResult<()> {
    check_name(name)?;

    if find(db_pool, name).await?.is_some() {
        return Err(AppError::Conflict(format!("{name} is already in the room")));
    }

    insert(db_pool, name).await?;
    tracing::info!(name = %name, "participant joined");

    if let Err(err) = log::announce(db_pool, &[name.to_owned()], log::JOIN_NOTICE).await {
        tracing::warn!(name = %name, error = %err, "join notice was not recorded");
    }

    Ok(())
}

/// Writes the participant row. A name taken since the caller last looked is a conflict.
async fn insert(db_pool: &SqlitePool, name: &str) -> AppResult<()> {
    sqlx::query("INSERT INTO participants (name,last_status) VALUES (?,?)")
        .bind(name)
        .bind(clock::now_millis())
        .execute(db_pool)
        .await
        .map_err(|err| {
            if matches!(&err, sqlx::Error::Database(db_err) if db_err.is_unique_violation()) {
                AppError::Conflict(format!("{name} is already in the room"))
            } else {
                AppError::from(err)
            }
        })?;

    Ok(())
}

/// Refreshes `last_status` for `name`, returning the stored value. Never moves it backwards.
pub async fn heartbeat(db_pool: &SqlitePool, name: &str) -> AppResult<i64> {
    let Some((last_status,)): Option<(i64,)> = sqlx::query_as(
        "UPDATE participants SET last_status=MAX(last_status,?) WHERE name=? \
         RETURNING last_status",
    )
    .bind(clock::now_millis())
    .bind(name)
    .fetch_optional(db_pool)
    .await?
    else {
        return Err(AppError::NotFound(format!("{name} is not in the room")));
    };

    tracing::debug!(name = %name, last_status, "heartbeat");
    Ok(last_status)
}

/// Deletes everyone whose last heartbeat is at or before `now - idle_timeout` and returns
/// their names. The select and the delete share one threshold, so a participant who
/// heartbeats in between keeps their seat.
pub async fn sweep_stale(
    db_pool: &SqlitePool,
    now: i64,
    idle_timeout: Duration,
) -> AppResult<Vec<String>> {
    let window = i64::try_from(idle_timeout.as_millis()).unwrap_or(i64::MAX);
    let threshold = now.saturating_sub(window);

    let stale: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM participants WHERE last_status<=?")
            .bind(threshold)
            .fetch_all(db_pool)
            .await?;
    if stale.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query("DELETE FROM participants WHERE last_status<=?")
        .bind(threshold)
        .execute(db_pool)
        .await?;

    Ok(stale.into_iter().map(|(name,)| name).collect())
}
