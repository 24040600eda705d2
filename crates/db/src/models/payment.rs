use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Initialized,
    Success,
    Failed,
    Abandoned,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Payment {
    pub reference: String,
    pub user_id: String,
    pub email: String,
    pub amount: i64, // kobo
    pub currency: String,
    pub plan: String,
    pub coupon_code: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub reference: String,
    pub user_id: String,
    pub email: String,
    pub amount: i64,
    pub currency: String,
    pub plan: String,
    pub coupon_code: Option<String>,
}

const PAYMENT_COLUMNS: &str =
    "reference, user_id, email, amount, currency, plan, coupon_code, status, created_at, paid_at";

impl Payment {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreatePayment,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"INSERT INTO payments (reference, user_id, email, amount, currency, plan, coupon_code, status, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {PAYMENT_COLUMNS}"#
        ))
        .bind(&data.reference)
        .bind(&data.user_id)
        .bind(&data.email)
        .bind(data.amount)
        .bind(&data.currency)
        .bind(&data.plan)
        .bind(&data.coupon_code)
        .bind(PaymentStatus::Initialized)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_reference<'e, E>(
        executor: E,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Move an `initialized` payment to `status`. Returns false when the
    /// payment is unknown or already left `initialized`, which is what makes
    /// replayed gateway events harmless.
    pub async fn transition_from_initialized<'e, E>(
        executor: E,
        reference: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE payments
               SET status = $2, paid_at = $3
               WHERE reference = $1 AND status = 'initialized'"#,
        )
        .bind(reference)
        .bind(status)
        .bind(paid_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
