#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use ::axum::Server;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use parley::{Config, Retriever};
use std::{env, net::SocketAddr};
use tracing::info;

use crate::{axum::app, utils::logger};

mod axum;
mod http;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    if env::var("RUNNING_IN_PRODUCTION").is_err() {
        dotenv().ok();
    }
    let _guard = logger::setup();

    let config = Config::from_env()?;
    let port = env::var("PORT")
        .map_or(Ok(8000), |p| p.parse())
        .context("$PORT must be a port number")?;

    if let Some(retriever) = Retriever::from_config(&config) {
        if retriever.ensure_index(None).await.context("Failed to prepare the search index")? {
            info!("Index {} has no documents yet, load them with `cli upload`", retriever.index_name());
        }
    }

    let app = app::create(&config);
    let address = SocketAddr::from(([0, 0, 0, 0], port));

    info!("⚡ Chat API started on http://{address}");
    Server::bind(&address)
        .serve(app.into_make_service())
        .await
        .context("Failed to start server")
}
