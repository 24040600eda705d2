use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::Utc;
use db::models::{
    admin_stats::AdminStats,
    coupon::{Coupon, CreateCoupon},
    payment::Payment,
    user::User,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{auth::AdminUser, error::ApiError, state::AppState};

const RECENT_PAYMENTS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdminOverview {
    pub stats: AdminStats,
    pub recent_payments: Vec<Payment>,
    pub total_users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SetCouponActive {
    pub active: bool,
}

/// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<ResponseJson<ApiResponse<AdminOverview>>, ApiError> {
    let pool = state.pool();
    let overview = AdminOverview {
        stats: AdminStats::get(pool).await?,
        recent_payments: Payment::find_recent(pool, RECENT_PAYMENTS).await?,
        total_users: User::count(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(overview)))
}

fn validate_coupon(data: &CreateCoupon) -> Result<(), ApiError> {
    let valid_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if data.code.is_empty() || !data.code.chars().all(valid_char) {
        return Err(ApiError::BadRequest(
            "Coupon code must be letters, digits, '-' or '_'".to_string(),
        ));
    }
    if !(1..=100).contains(&data.discount_percent) {
        return Err(ApiError::BadRequest(
            "Discount must be between 1 and 100 percent".to_string(),
        ));
    }
    if data.max_uses < 1 {
        return Err(ApiError::BadRequest("max_uses must be at least 1".to_string()));
    }
    if data.expires_at <= Utc::now() {
        return Err(ApiError::BadRequest("Expiry must be in the future".to_string()));
    }
    Ok(())
}

/// POST /api/admin/coupons
pub async fn create_coupon(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    axum::Json(payload): axum::Json<CreateCoupon>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Coupon>>), ApiError> {
    let data = CreateCoupon {
        code: payload.code.trim().to_ascii_uppercase(),
        ..payload
    };
    validate_coupon(&data)?;

    let coupon = match Coupon::create(state.pool(), &data, Utc::now()).await {
        Ok(coupon) => coupon,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::Conflict(format!("Coupon {} already exists", data.code)));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(admin_id = %admin.id, code = %coupon.code, percent = coupon.discount_percent, "Coupon created");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(coupon))))
}

/// GET /api/admin/coupons
pub async fn list_coupons(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<ResponseJson<ApiResponse<Vec<Coupon>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(Coupon::find_all(state.pool()).await?)))
}

/// POST /api/admin/coupons/{id}/active
pub async fn set_coupon_active(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetCouponActive>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Coupon::set_active(state.pool(), id, payload.active).await? == 0 {
        return Err(ApiError::NotFound("Coupon not found".to_string()));
    }
    tracing::info!(admin_id = %admin.id, coupon_id = %id, active = payload.active, "Coupon toggled");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/coupons", post(create_coupon).get(list_coupons))
        .route("/coupons/{id}/active", post(set_coupon_active))
}
