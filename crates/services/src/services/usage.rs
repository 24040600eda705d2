//! Build quotas: daily/monthly counter resets, lazy subscription expiry and
//! the check that gates every build.

use chrono::{DateTime, Utc};
use db::models::{
    admin_stats::AdminStats,
    user::{Plan, User, usage_month},
};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;

pub const EXPIRED_REASON: &str = "Subscription expired. Downgraded to free plan.";
pub const DAILY_LIMIT_REASON: &str =
    "Daily build limit reached for free plan. Please upgrade to Pro.";

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("user not found")]
    UserNotFound,
}

/// Outcome of a usage check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct UsageCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl UsageCheck {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// The user after resets were applied, and whether this refresh expired them
#[derive(Debug, Clone)]
pub struct RefreshedUser {
    pub user: User,
    pub just_expired: bool,
}

pub struct UsageService;

impl UsageService {
    /// Bring a user's counters and plan up to date for `now`.
    pub async fn refresh(
        pool: &SqlitePool,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshedUser, UsageError> {
        let user = User::find_by_id(pool, user_id)
            .await?
            .ok_or(UsageError::UserNotFound)?;
        let mut changed = false;

        let today = now.date_naive();
        if user.last_build_date != Some(today) {
            User::reset_daily_usage(pool, user_id, today, now).await?;
            changed = true;
        }

        let month = usage_month(now);
        if user.usage_month.as_deref() != Some(month.as_str()) {
            User::reset_monthly_usage(pool, user_id, &month, now).await?;
            changed = true;
        }

        let mut just_expired = false;
        if user.subscription_lapsed(now) {
            let mut tx = pool.begin().await?;
            if User::downgrade_expired(&mut *tx, user_id, now).await? {
                AdminStats::record(&mut *tx, 0, -1, now).await?;
                just_expired = true;
            }
            tx.commit().await?;
            changed = true;
            if just_expired {
                info!(user_id = %user_id, "Subscription expired, downgraded to free");
            }
        }

        let user = if changed {
            User::find_by_id(pool, user_id)
                .await?
                .ok_or(UsageError::UserNotFound)?
        } else {
            user
        };

        Ok(RefreshedUser { user, just_expired })
    }

    /// Whether the user may start a build right now
    pub async fn check(
        pool: &SqlitePool,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UsageCheck, UsageError> {
        let RefreshedUser { user, just_expired } = Self::refresh(pool, user_id, now).await?;

        if just_expired {
            return Ok(UsageCheck::deny(EXPIRED_REASON));
        }
        if user.plan == Plan::Free && user.daily_builds >= user.daily_build_limit {
            return Ok(UsageCheck::deny(DAILY_LIMIT_REASON));
        }
        Ok(UsageCheck::allow())
    }

    /// Count a finished build inside the caller's transaction. Returns false
    /// when the limit was reached by a concurrent build in the meantime.
    pub async fn record_build(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
        tokens: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, UsageError> {
        Ok(User::try_record_build(&mut **tx, user_id, tokens, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use db::{DBService, models::user::{CreateUser, SubscriptionStatus}};

    use super::*;

    async fn setup() -> (SqlitePool, User) {
        let db = DBService::new_in_memory().await.unwrap();
        let user = User::create(
            &db.pool,
            &CreateUser {
                id: "user-1".into(),
                email: "ada@example.com".into(),
                phone: None,
                referred_by: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        (db.pool, user)
    }

    async fn record(pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> bool {
        let mut tx = pool.begin().await.unwrap();
        let ok = UsageService::record_build(&mut tx, user_id, 100, now)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        ok
    }

    #[tokio::test]
    async fn free_user_is_denied_after_five_builds() {
        let (pool, user) = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();

        for _ in 0..5 {
            assert!(UsageService::check(&pool, &user.id, now).await.unwrap().allowed);
            assert!(record(&pool, &user.id, now).await);
        }

        let check = UsageService::check(&pool, &user.id, now).await.unwrap();
        assert!(!check.allowed);
        assert_eq!(check.reason.as_deref(), Some(DAILY_LIMIT_REASON));
        assert!(!record(&pool, &user.id, now).await);
    }

    #[tokio::test]
    async fn daily_counter_resets_on_a_new_day_but_monthly_does_not() {
        let (pool, user) = setup().await;
        let day_one = Utc.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap();
        UsageService::refresh(&pool, &user.id, day_one).await.unwrap();
        for _ in 0..5 {
            record(&pool, &user.id, day_one).await;
        }

        let day_two = day_one + Duration::hours(2);
        let check = UsageService::check(&pool, &user.id, day_two).await.unwrap();
        assert!(check.allowed);

        let refreshed = UsageService::refresh(&pool, &user.id, day_two).await.unwrap();
        assert_eq!(refreshed.user.daily_builds, 0);
        assert_eq!(refreshed.user.monthly_builds, 5);
        assert_eq!(refreshed.user.monthly_tokens, 500);
    }

    #[tokio::test]
    async fn monthly_counters_reset_in_a_new_month() {
        let (pool, user) = setup().await;
        let march = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        UsageService::refresh(&pool, &user.id, march).await.unwrap();
        record(&pool, &user.id, march).await;

        let april = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        let refreshed = UsageService::refresh(&pool, &user.id, april).await.unwrap();
        assert_eq!(refreshed.user.monthly_builds, 0);
        assert_eq!(refreshed.user.monthly_tokens, 0);
        assert_eq!(refreshed.user.usage_month.as_deref(), Some("2026-04"));
    }

    #[tokio::test]
    async fn lapsed_subscription_is_downgraded_once() {
        let (pool, user) = setup().await;
        let paid = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        User::activate_pro(&pool, &user.id, paid + Duration::days(30), paid)
            .await
            .unwrap();
        AdminStats::record(&pool, 100_000, 1, paid).await.unwrap();

        let later = paid + Duration::days(31);
        let check = UsageService::check(&pool, &user.id, later).await.unwrap();
        assert!(!check.allowed);
        assert_eq!(check.reason.as_deref(), Some(EXPIRED_REASON));

        let refreshed = UsageService::refresh(&pool, &user.id, later).await.unwrap();
        assert!(!refreshed.just_expired);
        assert_eq!(refreshed.user.plan, Plan::Free);
        assert_eq!(refreshed.user.subscription_status, SubscriptionStatus::Expired);
        assert_eq!(refreshed.user.daily_build_limit, 5);
        assert_eq!(AdminStats::get(&pool).await.unwrap().active_subscribers, 0);

        // A free build is allowed again on the following check.
        assert!(UsageService::check(&pool, &user.id, later).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn pro_user_is_never_limited_by_daily_builds() {
        let (pool, user) = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 5, 5, 8, 0, 0).unwrap();
        User::activate_pro(&pool, &user.id, now + Duration::days(30), now)
            .await
            .unwrap();

        for _ in 0..8 {
            assert!(record(&pool, &user.id, now).await);
        }
        assert!(UsageService::check(&pool, &user.id, now).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let (pool, _) = setup().await;
        let err = UsageService::check(&pool, "ghost", Utc::now()).await.unwrap_err();
        assert!(matches!(err, UsageError::UserNotFound));
    }
}
