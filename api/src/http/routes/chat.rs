use axum::{routing::post, Router};

use crate::{axum::state::AppState, http::controllers::ChatController};

pub fn mount() -> Router<AppState> {
    Router::new().nest(
        "/chat",
        Router::new().route("/stream", post(ChatController::stream)),
    )
}
