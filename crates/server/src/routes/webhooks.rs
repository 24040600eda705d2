use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::post,
};
use chrono::Utc;
use serde_json::{Value, json};
use services::services::webhook::{SIGNATURE_HEADER, WebhookOutcome};

use crate::{error::ApiError, state::AppState};

/// POST /api/paystack/webhook
///
/// Takes the raw body; the signature covers the exact bytes Paystack sent.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.webhooks().handle(&body, signature, Utc::now()).await?;
    match &outcome {
        WebhookOutcome::Settled(settled) => {
            tracing::info!(outcome = ?settled, "Paystack charge processed")
        }
        WebhookOutcome::Failed { reference, changed } => {
            tracing::info!(reference = %reference, changed, "Paystack charge failed")
        }
        WebhookOutcome::Ignored(event) => tracing::debug!(event = %event, "Ignored Paystack event"),
    }
    Ok(ResponseJson(json!({ "received": true })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(paystack_webhook))
}
