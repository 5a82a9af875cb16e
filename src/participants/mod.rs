mod handlers;
pub mod presence;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use presence::Participant;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/participants", get(handlers::list).post(handlers::register))
        .route("/status", post(handlers::status))
}
