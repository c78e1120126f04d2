use axum::{routing::get, Json, Router};
use std::env;

mod chat;

use crate::{axum::state::AppState, http::controllers::HomeController};

pub fn mount() -> Router<AppState> {
    Router::new()
        .merge(chat::mount())
        .route("/", get(HomeController::index))
        .route("/version", get(version))
}

#[derive(serde::Serialize)]
struct ApiVersion {
    semver: String,
    rev: Option<String>,
    compile_time: String,
}

#[allow(clippy::unused_async)]
async fn version() -> Json<ApiVersion> {
    Json(ApiVersion {
        rev: env::var("GIT_REV").ok(),
        semver: env!("CARGO_PKG_VERSION").to_string(),
        compile_time: env!("STATIC_BUILD_DATE").to_string(),
    })
}
