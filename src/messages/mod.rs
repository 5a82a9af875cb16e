mod handlers;
pub mod log;

use axum::{routing::get, Router};

use crate::AppState;

pub use log::{Message, MessageKind};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(handlers::history).post(handlers::post))
}
