//! Profile creation for users authenticated by the identity provider.

use chrono::{DateTime, Utc};
use db::models::user::{CreateUser, User};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;

use super::referral;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("profile already exists")]
    AlreadyRegistered,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct SignupRequest {
    pub phone: Option<String>,
    pub referred_by: Option<String>,
}

/// Create the profile for `user_id`. A valid `referred_by` code is stored on
/// the new user and counted for the referrer in the same transaction.
pub async fn signup(
    pool: &SqlitePool,
    user_id: &str,
    email: &str,
    request: &SignupRequest,
    now: DateTime<Utc>,
) -> Result<User, AccountError> {
    if User::find_by_id(pool, user_id).await?.is_some()
        || User::find_by_email(pool, email).await?.is_some()
    {
        return Err(AccountError::AlreadyRegistered);
    }

    let referrer = referral::resolve_referrer(pool, request.referred_by.as_deref()).await?;
    let data = CreateUser {
        id: user_id.to_string(),
        email: email.to_string(),
        phone: request.phone.clone().filter(|p| !p.trim().is_empty()),
        referred_by: referrer.as_ref().map(|r| r.referral_code.clone()),
    };

    let mut tx = pool.begin().await?;
    let user = match User::create(&mut *tx, &data, now).await {
        Ok(user) => user,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AccountError::AlreadyRegistered);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(referrer) = referrer {
        referral::register_referral(&mut *tx, &referrer, &user.id, now).await?;
    }
    tx.commit().await?;
    info!(user_id = %user.id, referral_code = %user.referral_code, "User signed up");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn signup_with_referral_counts_for_referrer() {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        let referrer = signup(&db.pool, "r", "r@example.com", &SignupRequest::default(), now)
            .await
            .unwrap();

        let request = SignupRequest {
            phone: Some("+2348000000000".into()),
            referred_by: Some(referrer.referral_code.to_lowercase()),
        };
        let user = signup(&db.pool, "n", "n@example.com", &request, now).await.unwrap();
        assert_eq!(user.referred_by.as_deref(), Some(referrer.referral_code.as_str()));

        let referrer = User::find_by_id(&db.pool, "r").await.unwrap().unwrap();
        assert_eq!(referrer.referral_count, 1);
    }

    #[tokio::test]
    async fn failed_referral_count_rolls_back_the_profile() {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        let referrer = signup(&db.pool, "r", "r@example.com", &SignupRequest::default(), now)
            .await
            .unwrap();
        sqlx::query(
            r#"CREATE TRIGGER block_referral_count BEFORE UPDATE OF referral_count ON users
               BEGIN SELECT RAISE(ABORT, 'referral counter unavailable'); END"#,
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let request = SignupRequest {
            phone: None,
            referred_by: Some(referrer.referral_code.clone()),
        };
        let err = signup(&db.pool, "n", "n@example.com", &request, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Database(_)));
        assert!(User::find_by_id(&db.pool, "n").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_referral_code_is_dropped() {
        let db = DBService::new_in_memory().await.unwrap();
        let request = SignupRequest {
            phone: None,
            referred_by: Some("ZZZZZZ".into()),
        };
        let user = signup(&db.pool, "n", "n@example.com", &request, Utc::now())
            .await
            .unwrap();
        assert_eq!(user.referred_by, None);
    }

    #[tokio::test]
    async fn second_signup_is_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let req = SignupRequest::default();
        signup(&db.pool, "u", "u@example.com", &req, Utc::now()).await.unwrap();
        let err = signup(&db.pool, "u", "u@example.com", &req, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::AlreadyRegistered));
    }
}
