use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{user_header, AppError, AppResult, AppState};

use super::presence::{self, Participant};

#[derive(Debug, Deserialize)]
pub(crate) struct NewParticipant {
    name: Option<String>,
}

impl NewParticipant {
    pub(crate) fn validate(self) -> AppResult<String> {
        let Some(name) = self.name else {
            return Err(AppError::Validation("name is required".to_owned()));
        };
        presence::check_name(&name)?;
        Ok(name)
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    payload: Result<Json<NewParticipant>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(body) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let name = body.validate()?;

    presence::register(&db_pool, &name).await?;
    Ok(StatusCode::CREATED)
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(State(db_pool): State<SqlitePool>) -> AppResult<Json<Vec<Participant>>> {
    Ok(Json(presence::list(&db_pool).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn status(
    State(db_pool): State<SqlitePool>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let Some(name) = user_header(&headers) else {
        return Err(AppError::NotFound("no user header".to_owned()));
    };

    presence::heartbeat(&db_pool, &name).await?;
    Ok(StatusCode::OK)
}
