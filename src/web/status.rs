//! Health and status handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{trace, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: &'static str,
    version: &'static str,
    commit: &'static str,
    database: &'static str,
    generations_in_flight: usize,
}

/// Liveness probe; touches nothing but the process.
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness and build info, including a database round-trip.
pub(super) async fn status(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    let database_ok = match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Status check could not reach the database");
            false
        }
    };

    let code = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(StatusResponse {
            status: if database_ok { "active" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("GIT_COMMIT_SHORT"),
            database: if database_ok { "connected" } else { "unreachable" },
            generations_in_flight: state.suggestions.generations_in_flight(),
        }),
    )
}
