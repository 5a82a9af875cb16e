//! The room's message log and who gets to read what in it.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{clock, participants::presence, AppError, AppResult, EVERYONE};

pub const JOIN_NOTICE: &str = "entered the room";
pub const LEAVE_NOTICE: &str = "left the room";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    PrivateMessage,
    /// Join/leave notices; never accepted from users
    Status,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        use MessageKind::*;
        match self {
            Message => "message",
            PrivateMessage => "private_message",
            Status => "status",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use MessageKind::*;
        match s {
            "message" => Ok(Message),
            "private_message" => Ok(PrivateMessage),
            "status" => Ok(Status),
            other => Err(format!("unknown message type {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// `HH:MM:SS` at insertion
    pub time: String,
}

impl Message {
    /// Public messages are readable by everyone whatever their addressee.
    pub fn is_visible_to(&self, requester: &str) -> bool {
        self.to == requester
            || self.from == requester
            || self.to == EVERYONE
            || self.kind == MessageKind::Message
    }
}

/// Inserts `messages` in one statement, preserving their order in the log.
pub async fn append(db_pool: &SqlitePool, messages: &[Message]) -> AppResult<()> {
    if messages.is_empty() {
        return Ok(());
    }

    let mut query =
        QueryBuilder::<Sqlite>::new("INSERT INTO messages (sender,recipient,text,kind,time) ");
    query.push_values(messages, |mut row, msg| {
        row.push_bind(msg.from.clone())
            .push_bind(msg.to.clone())
            .push_bind(msg.text.clone())
            .push_bind(msg.kind.as_str())
            .push_bind(msg.time.clone());
    });
    query.build().execute(db_pool).await?;

    Ok(())
}

/// Appends one room-wide status notice per name, as a single batch.
pub async fn announce(db_pool: &SqlitePool, names: &[String], text: &str) -> AppResult<()> {
    let time = clock::wall_time()?;
    let notices: Vec<Message> = names
        .iter()
        .map(|name| Message {
            from: name.clone(),
            to: EVERYONE.to_owned(),
            text: text.to_owned(),
            kind: MessageKind::Status,
            time: time.clone(),
        })
        .collect();

    append(db_pool, &notices).await
}

/// A user post. `sender` must currently be in the room.
pub async fn post(
    db_pool: &SqlitePool,
    sender: &str,
    to: &str,
    text: &str,
    kind: MessageKind,
) -> AppResult<()> {
    if to.trim().is_empty() {
        return Err(AppError::Validation("to must not be blank".to_owned()));
    }
    if text.trim().is_empty() {
        return Err(AppError::Validation("text must not be blank".to_owned()));
    }
    if kind == MessageKind::Status {
        return Err(AppError::Validation("status messages are reserved".to_owned()));
    }

    if presence::find(db_pool, sender).await?.is_none() {
        return Err(AppError::SenderUnknown(sender.to_owned()));
    }

    append(
        db_pool,
        &[Message {
            from: sender.to_owned(),
            to: to.to_owned(),
            text: text.to_owned(),
            kind,
            time: clock::wall_time()?,
        }],
    )
    .await
}

/// What `requester` can see of the log, in log order, optionally only the last `limit`.
pub async fn history(
    db_pool: &SqlitePool,
    requester: &str,
    limit: Option<usize>,
) -> AppResult<Vec<Message>> {
    let rows: Vec<(String, String, String, String, String)> =
        sqlx::query_as("SELECT sender,recipient,text,kind,time FROM messages ORDER BY id")
            .fetch_all(db_pool)
            .await?;

    let mut visible = Vec::new();
    for (from, to, text, kind, time) in rows {
        let kind = kind.parse::<MessageKind>().map_err(|err| AppError::Storage(anyhow!(err)))?;
        let msg = Message { from, to, text, kind, time };
        if msg.is_visible_to(requester) {
            visible.push(msg);
        }
    }

    Ok(tail(visible, limit))
}

pub fn tail<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(n) if n < items.len() => items.split_off(items.len() - n),
        _ => items,
    }
}

/// Only positive integers count as a limit.
pub fn parse_limit(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
