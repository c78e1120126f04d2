use axum::{body::Body, http::Request, Router};
use parley::{Config, Orchestrator};
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    axum::state::{self, AppState},
    http::routes,
};

pub fn create(config: &Config) -> Router {
    router(state::create(Orchestrator::from_config(config)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::mount())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(SentryHttpLayer::with_transaction())
        .layer(NewSentryLayer::<Request<Body>>::new_from_top())
        .with_state(state)
}
