pub mod clock;
pub mod config;
pub mod db;
pub mod messages;
pub mod participants;
pub mod sweep;

use std::fmt;

use axum::{
    extract::FromRef,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Addressee of a message meant for the whole room.
pub const EVERYONE: &str = "Todos";

/// Header carrying the (unverified) name of the participant making a request.
pub const USER_HEADER: &str = "user";

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(participants::router())
        .merge(messages::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub(crate) fn user_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(USER_HEADER)?;
    std::str::from_utf8(value.as_bytes())
        .ok()
        .map(str::to_owned)
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Conflict(String),
    NotFound(String),
    SenderUnknown(String),
    Storage(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Validation(_) | SenderUnknown(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Conflict(_) => StatusCode::CONFLICT,
            NotFound(_) => StatusCode::NOT_FOUND,
            Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AppError::*;
        match self {
            Validation(reason) => write!(f, "invalid request: {reason}"),
            Conflict(reason) => write!(f, "conflict: {reason}"),
            NotFound(reason) => write!(f, "not found: {reason}"),
            SenderUnknown(sender) => write!(f, "unknown sender: {sender}"),
            Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Storage(err) => {
                tracing::error!(
                    error = %err,
                    backtrace = %err.backtrace(),
                    "request failed on storage"
                );
                status.into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Storage(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(sqlx::Error);
apperr_impl!(time::error::Format);
