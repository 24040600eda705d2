use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use chrono::Utc;
use services::services::{
    referral::{self, ReferralSummary},
    usage::UsageService,
};
use utils::response::ApiResponse;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// GET /api/referrals
pub async fn get_referrals(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<ReferralSummary>>, ApiError> {
    let user = UsageService::refresh(state.pool(), &auth.user_id, Utc::now()).await?.user;
    let summary = referral::summary(state.pool(), &user).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_referrals))
}
