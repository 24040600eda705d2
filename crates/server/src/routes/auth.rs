use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use chrono::Utc;
use db::models::user::User;
use services::services::account::{self, SignupRequest};
use utils::response::ApiResponse;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// POST /api/auth/signup
/// Create the profile for the authenticated identity
pub async fn signup(
    State(state): State<AppState>,
    auth: AuthUser,
    axum::Json(payload): axum::Json<SignupRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<User>>), ApiError> {
    let email = auth
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Token carries no email address".to_string()))?;

    let user = account::signup(state.pool(), &auth.user_id, email, &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(user))))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/signup", post(signup))
}
