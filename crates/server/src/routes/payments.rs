use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use services::services::{
    billing::{PaymentInitialization, PaymentVerification},
    usage::UsageService,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

fn default_plan() -> String {
    "pro".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct InitializePaymentRequest {
    #[serde(default = "default_plan")]
    pub plan: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// POST /api/payments/initialize
/// Start a Paystack checkout for the caller
pub async fn initialize_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    axum::Json(payload): axum::Json<InitializePaymentRequest>,
) -> Result<ResponseJson<ApiResponse<PaymentInitialization>>, ApiError> {
    let now = Utc::now();
    let user = UsageService::refresh(state.pool(), &auth.user_id, now).await?.user;
    let coupon = payload
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let init = state
        .billing()
        .initialize_payment(&user, payload.plan.trim(), coupon, now)
        .await?;
    Ok(ResponseJson(ApiResponse::success(init)))
}

/// GET /api/payments/{reference}/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> Result<ResponseJson<ApiResponse<PaymentVerification>>, ApiError> {
    let verification = state
        .billing()
        .verify_payment(&auth.user_id, reference.trim(), Utc::now())
        .await?;
    Ok(ResponseJson(ApiResponse::success(verification)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize_payment))
        .route("/{reference}/verify", get(verify_payment))
}
