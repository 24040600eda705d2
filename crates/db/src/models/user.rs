use chrono::{DateTime, NaiveDate, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

pub const REFERRAL_CODE_LEN: usize = 6;
const REFERRAL_CODE_ATTEMPTS: usize = 5;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

/// Quota attached to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub daily_build_limit: i64,
    pub monthly_token_limit: i64,
}

impl Plan {
    pub fn limits(self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                daily_build_limit: 5,
                monthly_token_limit: 50_000,
            },
            Plan::Pro => PlanLimits {
                daily_build_limit: 9999,
                monthly_token_limit: 1_000_000,
            },
        }
    }
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Expired,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub plan: Plan,
    pub role: UserRole,
    pub daily_builds: i64,
    pub monthly_builds: i64,
    pub monthly_tokens: i64,
    pub last_build_date: Option<NaiveDate>,
    pub usage_month: Option<String>, // "YYYY-MM" the monthly counters belong to
    pub daily_build_limit: i64,
    pub monthly_token_limit: i64,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referral_count: i64,
    pub referral_earnings: i64, // kobo
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub referred_by: Option<String>,
}

const USER_COLUMNS: &str = "id, email, phone, plan, role, daily_builds, monthly_builds, monthly_tokens, \
     last_build_date, usage_month, daily_build_limit, monthly_token_limit, subscription_status, \
     subscription_expiry, referral_code, referred_by, referral_count, referral_earnings, \
     created_at, updated_at";

/// Formats the calendar month the monthly counters are keyed on.
pub fn usage_month(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

pub fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn has_active_subscription(&self) -> bool {
        self.plan == Plan::Pro && self.subscription_status == SubscriptionStatus::Active
    }

    /// Whether a pro subscription has run past its expiry
    pub fn subscription_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.plan == Plan::Pro && self.subscription_expiry.is_some_and(|expiry| expiry < now)
    }

    pub async fn create<'a, A>(
        conn: A,
        data: &CreateUser,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        A: Acquire<'a, Database = Sqlite>,
    {
        let mut conn = conn.acquire().await?;
        let limits = Plan::Free.limits();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let referral_code = generate_referral_code();
            let result = sqlx::query_as::<_, User>(&format!(
                r#"INSERT INTO users (id, email, phone, plan, role, daily_build_limit, monthly_token_limit,
                                      subscription_status, referral_code, referred_by, created_at, updated_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                   RETURNING {USER_COLUMNS}"#
            ))
            .bind(&data.id)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(Plan::Free)
            .bind(UserRole::User)
            .bind(limits.daily_build_limit)
            .bind(limits.monthly_token_limit)
            .bind(SubscriptionStatus::Inactive)
            .bind(&referral_code)
            .bind(&data.referred_by)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *conn)
            .await;

            match result {
                Err(sqlx::Error::Database(e))
                    if e.is_unique_violation()
                        && e.message().contains("referral_code")
                        && attempt < REFERRAL_CODE_ATTEMPTS =>
                {
                    tracing::debug!(referral_code = %referral_code, "Referral code collision, regenerating");
                }
                other => return other,
            }
        }
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_referral_code<'e, E>(
        executor: E,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1"
        ))
        .bind(code)
        .fetch_optional(executor)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    /// Zero the daily counter and stamp the new day
    pub async fn reset_daily_usage(
        pool: &SqlitePool,
        id: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET daily_builds = 0, last_build_date = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(today)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn reset_monthly_usage(
        pool: &SqlitePool,
        id: &str,
        month: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE users
               SET monthly_builds = 0, monthly_tokens = 0, usage_month = $2, updated_at = $3
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(month)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Downgrade a lapsed pro subscription to the free plan. Returns false when
    /// the row no longer matched (already downgraded or renewed meanwhile).
    pub async fn downgrade_expired<'e, E>(
        executor: E,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let limits = Plan::Free.limits();
        let result = sqlx::query(
            r#"UPDATE users
               SET plan = $2,
                   subscription_status = $3,
                   daily_build_limit = $4,
                   monthly_token_limit = $5,
                   updated_at = $6
               WHERE id = $1
                 AND plan = 'pro'
                 AND subscription_status != 'expired'
                 AND subscription_expiry IS NOT NULL
                 AND subscription_expiry < $6"#,
        )
        .bind(id)
        .bind(Plan::Free)
        .bind(SubscriptionStatus::Expired)
        .bind(limits.daily_build_limit)
        .bind(limits.monthly_token_limit)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn activate_pro<'e, E>(
        executor: E,
        id: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let limits = Plan::Pro.limits();
        sqlx::query(
            r#"UPDATE users
               SET plan = $2,
                   subscription_status = $3,
                   subscription_expiry = $4,
                   daily_build_limit = $5,
                   monthly_token_limit = $6,
                   updated_at = $7
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(Plan::Pro)
        .bind(SubscriptionStatus::Active)
        .bind(expiry)
        .bind(limits.daily_build_limit)
        .bind(limits.monthly_token_limit)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Count one build against the user, but only while the plan still allows
    /// it. The limit check and the increment are one statement, so concurrent
    /// builds cannot both slip under the limit.
    pub async fn try_record_build<'e, E>(
        executor: E,
        id: &str,
        tokens: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE users
               SET daily_builds = daily_builds + 1,
                   monthly_builds = monthly_builds + 1,
                   monthly_tokens = monthly_tokens + $2,
                   updated_at = $3
               WHERE id = $1
                 AND (plan = 'pro' OR daily_builds < daily_build_limit)"#,
        )
        .bind(id)
        .bind(tokens)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn increment_referral_count<'e, E>(
        executor: E,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE users SET referral_count = referral_count + 1, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn credit_referral_earnings<'e, E>(
        executor: E,
        id: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"UPDATE users
               SET referral_earnings = referral_earnings + $2, updated_at = $3
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }
}
