use chrono::{DateTime, Utc};
use db::models::{referral::Referral, user::User};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referral_count: i64,
    pub referral_earnings: i64, // kobo
    pub referrals: Vec<Referral>,
}

pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    (!code.is_empty()).then(|| code.to_ascii_uppercase())
}

/// Resolve a signup's referral code to the referrer. Unknown codes resolve to
/// `None` and are dropped rather than failing the signup.
pub async fn resolve_referrer(
    pool: &SqlitePool,
    code: Option<&str>,
) -> Result<Option<User>, sqlx::Error> {
    let Some(code) = code.and_then(normalize_code) else {
        return Ok(None);
    };
    let referrer = User::find_by_referral_code(pool, &code).await?;
    if referrer.is_none() {
        debug!(code = %code, "Unknown referral code at signup");
    }
    Ok(referrer)
}

/// Count a new signup against the referrer
pub async fn register_referral<'e, E>(
    executor: E,
    referrer: &User,
    new_user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    User::increment_referral_count(executor, &referrer.id, now).await?;
    info!(referrer_id = %referrer.id, new_user_id = %new_user_id, "Referral signup registered");
    Ok(())
}

pub async fn summary(pool: &SqlitePool, user: &User) -> Result<ReferralSummary, sqlx::Error> {
    let referrals = Referral::find_by_referrer(pool, &user.id).await?;
    Ok(ReferralSummary {
        referral_code: user.referral_code.clone(),
        referral_count: user.referral_count,
        referral_earnings: user.referral_earnings,
        referrals,
    })
}
