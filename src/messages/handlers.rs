use axum::{
    debug_handler,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{user_header, AppError, AppResult, AppState};

use super::log::{self, Message, MessageKind};

#[derive(Debug, Deserialize)]
pub(crate) struct NewMessage {
    to: Option<String>,
    text: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl NewMessage {
    pub(crate) fn validate(self) -> AppResult<(String, String, MessageKind)> {
        let missing = |field: &str| AppError::Validation(format!("{field} is required"));

        let to = self.to.filter(|to| !to.trim().is_empty()).ok_or_else(|| missing("to"))?;
        let text = self.text.filter(|text| !text.trim().is_empty()).ok_or_else(|| missing("text"))?;
        let kind = match self.kind.as_deref().map(str::parse::<MessageKind>) {
            Some(Ok(kind @ (MessageKind::Message | MessageKind::PrivateMessage))) => kind,
            Some(Ok(MessageKind::Status)) => {
                return Err(AppError::Validation("status messages are reserved".to_owned()));
            }
            Some(Err(reason)) => return Err(AppError::Validation(reason)),
            None => return Err(missing("type")),
        };

        Ok((to, text, kind))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn post(
    State(db_pool): State<SqlitePool>,
    headers: HeaderMap,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Some(sender) = user_header(&headers) else {
        return Err(AppError::Validation("user header is required".to_owned()));
    };
    let Json(body) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let (to, text, kind) = body.validate()?;

    log::post(&db_pool, &sender, &to, &text, kind).await?;
    Ok(StatusCode::CREATED)
}

#[debug_handler(state = AppState)]
pub(crate) async fn history(
    State(db_pool): State<SqlitePool>,
    headers: HeaderMap,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> AppResult<Json<Vec<Message>>> {
    let Some(requester) = user_header(&headers) else {
        return Err(AppError::Validation("user header is required".to_owned()));
    };

    // an unreadable query string (e.g. a repeated `limit`) means no limit
    let limit = match query {
        Ok(Query(HistoryQuery { limit })) => log::parse_limit(limit.as_deref()),
        Err(_) => None,
    };
    Ok(Json(log::history(&db_pool, &requester, limit).await?))
}
