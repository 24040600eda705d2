use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: i64,
    pub max_uses: i64,
    pub used_count: i64,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCoupon {
    pub code: String,
    pub discount_percent: i64,
    pub max_uses: i64,
    pub expires_at: DateTime<Utc>,
}

const COUPON_COLUMNS: &str =
    "id, code, discount_percent, max_uses, used_count, expires_at, active, created_at";

impl Coupon {
    /// A coupon can be applied when it is active, not yet expired and under its cap
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now && self.used_count < self.max_uses
    }

    /// Discount in minor units for `amount`, rounded down
    pub fn discount_for(&self, amount: i64) -> i64 {
        let percent = i128::from(self.discount_percent.clamp(0, 100));
        // Never exceeds `amount`, so the narrowing cannot fail
        i64::try_from(i128::from(amount) * percent / 100).unwrap_or(amount)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateCoupon,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Coupon>(&format!(
            r#"INSERT INTO coupons (id, code, discount_percent, max_uses, used_count, expires_at, active, created_at)
               VALUES ($1, $2, $3, $4, 0, $5, 1, $6)
               RETURNING {COUPON_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&data.code)
        .bind(data.discount_percent)
        .bind(data.max_uses)
        .bind(data.expires_at)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_active_by_code(
        pool: &SqlitePool,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 AND active = 1"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Consume one use. The cap is re-checked in the same statement, so two
    /// redemptions racing for the last use cannot both succeed.
    pub async fn try_redeem(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE coupons
               SET used_count = used_count + 1
               WHERE id = $1 AND active = 1 AND used_count < max_uses"#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Give back a use taken by `try_redeem` for a checkout that never started
    pub async fn release(pool: &SqlitePool, code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE coupons
               SET used_count = used_count - 1
               WHERE code = $1 AND used_count > 0"#,
        )
        .bind(code)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_active(pool: &SqlitePool, id: Uuid, active: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE coupons SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
