//! HTTP request handlers

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub const ALIVE: &str = "Bot is alive";

/// Create the liveness router
pub fn create_router() -> Router {
    Router::new()
        .route("/", get(alive))
        .layer(TraceLayer::new_for_http())
}

async fn alive() -> &'static str {
    ALIVE
}
