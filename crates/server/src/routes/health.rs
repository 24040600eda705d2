use axum::{Router, extract::State, http::StatusCode, response::Json as ResponseJson, routing::get};
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health
pub async fn health() -> ResponseJson<Value> {
    ResponseJson(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ready
/// Healthy only while the database answers
pub async fn ready(State(state): State<AppState>) -> (StatusCode, ResponseJson<Value>) {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => (StatusCode::OK, ResponseJson(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ResponseJson(json!({ "status": "unavailable" })),
            )
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
}
