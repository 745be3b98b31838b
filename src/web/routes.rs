//! Web API router construction and shared response utilities.

use axum::{Router, http::StatusCode, routing::get};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::state::AppState;
use crate::web::{status, suggestions};

/// Cache-Control presets.
pub mod cache {
    /// Per-user responses must never be stored by shared caches.
    pub const PRIVATE: &str = "private, no-store";
}

/// Creates the web server router.
///
/// `request_timeout` bounds each request; a generation that outlives it keeps
/// running and lands in the cache for the next request.
pub fn create_router(app_state: AppState, request_timeout: Duration) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route(
            "/users/{user_id}/suggestions",
            get(suggestions::get_suggestions),
        )
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        TraceLayer::new_for_http(),
        CorsLayer::permissive(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout),
    ))
}
