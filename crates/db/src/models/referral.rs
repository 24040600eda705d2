use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "referral_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    #[default]
    Paid,
}

/// Commission earned by a referrer on one payment of a referred user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub payment_reference: String,
    pub commission_amount: i64, // kobo
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
}

const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referred_user_id, payment_reference, commission_amount, status, created_at";

impl Referral {
    pub async fn create<'e, E>(
        executor: E,
        referrer_id: &str,
        referred_user_id: &str,
        payment_reference: &str,
        commission_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Referral>(&format!(
            r#"INSERT INTO referrals (id, referrer_id, referred_user_id, payment_reference, commission_amount, status, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {REFERRAL_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(referrer_id)
        .bind(referred_user_id)
        .bind(payment_reference)
        .bind(commission_amount)
        .bind(ReferralStatus::Paid)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_referrer(
        pool: &SqlitePool,
        referrer_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(referrer_id)
        .fetch_all(pool)
        .await
    }
}
