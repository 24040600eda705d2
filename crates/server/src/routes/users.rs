use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use chrono::Utc;
use db::models::user::User;
use services::services::usage::{UsageCheck, UsageService};
use utils::response::ApiResponse;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// GET /api/me
/// Current profile with daily/monthly resets and expiry applied
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let refreshed = UsageService::refresh(state.pool(), &auth.user_id, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(refreshed.user)))
}

/// GET /api/me/usage
pub async fn get_usage(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<UsageCheck>>, ApiError> {
    let check = UsageService::check(state.pool(), &auth.user_id, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(check)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_me))
        .route("/usage", get(get_usage))
}
