use axum::{routing::{get, post}, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;
use tokio::net::TcpListener;

use leveldeck_core::DeckService;
use crate::api::routes::{command, progress, AppState};

pub fn router(service: Arc<DeckService>) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/", post(command))
        .route("/progress", get(progress))
        .with_state(state)
        // tracing's `log` feature routes these events to env_logger
        .layer(TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO)))
}

pub async fn run(service: Arc<DeckService>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(service);
    let listener = TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
