//! Applies the effects of a successful charge: payment status, subscription,
//! revenue stats and referral commission, all in one transaction.

use chrono::{DateTime, Duration, Utc};
use db::models::{
    admin_stats::AdminStats,
    payment::{Payment, PaymentStatus},
    referral::Referral,
    user::User,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const SUBSCRIPTION_DAYS: i64 = 30;
pub const REFERRAL_COMMISSION_PERCENT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled {
        user_id: String,
        expires_at: DateTime<Utc>,
        commission: Option<i64>,
    },
    /// The payment had already left `initialized`; nothing was changed.
    AlreadyProcessed,
    UnknownPayment,
}

pub fn referral_commission(amount: i64) -> i64 {
    let commission = i128::from(amount) * i128::from(REFERRAL_COMMISSION_PERCENT) / 100;
    i64::try_from(commission).unwrap_or(amount)
}

/// Settle the payment `reference` for `amount_paid` kobo. Safe to call more
/// than once for the same reference.
pub async fn settle_successful_charge(
    pool: &SqlitePool,
    reference: &str,
    amount_paid: i64,
    now: DateTime<Utc>,
) -> Result<SettlementOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(payment) = Payment::find_by_reference(&mut *tx, reference).await? else {
        warn!(reference = %reference, "Charge for unknown payment reference");
        return Ok(SettlementOutcome::UnknownPayment);
    };
    if payment.amount != amount_paid {
        warn!(
            reference = %reference,
            expected = payment.amount,
            paid = amount_paid,
            "Charged amount differs from the initialized amount"
        );
    }

    if !Payment::transition_from_initialized(&mut *tx, reference, PaymentStatus::Success, Some(now))
        .await?
    {
        info!(reference = %reference, status = %payment.status, "Payment already processed");
        return Ok(SettlementOutcome::AlreadyProcessed);
    }

    let user = User::find_by_id(&mut *tx, &payment.user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let was_active = user.has_active_subscription();

    // Renewing early extends from the current expiry instead of today.
    let base = user
        .subscription_expiry
        .filter(|expiry| was_active && *expiry > now)
        .unwrap_or(now);
    let expires_at = base + Duration::days(SUBSCRIPTION_DAYS);
    User::activate_pro(&mut *tx, &user.id, expires_at, now).await?;

    AdminStats::record(&mut *tx, amount_paid, if was_active { 0 } else { 1 }, now).await?;

    let mut commission = None;
    if let Some(code) = user.referred_by.as_deref() {
        match User::find_by_referral_code(&mut *tx, code).await? {
            Some(referrer) if referrer.id != user.id => {
                let amount = referral_commission(amount_paid);
                User::credit_referral_earnings(&mut *tx, &referrer.id, amount, now).await?;
                Referral::create(&mut *tx, &referrer.id, &user.id, reference, amount, now).await?;
                info!(
                    referrer_id = %referrer.id,
                    referred_user_id = %user.id,
                    commission = amount,
                    "Referral commission credited"
                );
                commission = Some(amount);
            }
            _ => warn!(code = %code, user_id = %user.id, "Referral code did not resolve to a referrer"),
        }
    }

    tx.commit().await?;
    info!(
        reference = %reference,
        user_id = %user.id,
        amount = amount_paid,
        expires_at = %expires_at,
        "Payment settled, pro plan active"
    );

    Ok(SettlementOutcome::Settled {
        user_id: user.id,
        expires_at,
        commission,
    })
}

/// Mark a still-initialized payment as failed or abandoned
pub async fn settle_unsuccessful_charge(
    pool: &SqlitePool,
    reference: &str,
    status: PaymentStatus,
) -> Result<bool, sqlx::Error> {
    let changed = Payment::transition_from_initialized(pool, reference, status, None).await?;
    if changed {
        info!(reference = %reference, status = %status, "Payment closed without charge");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use db::{
        DBService,
        models::{
            payment::CreatePayment,
            user::{CreateUser, Plan, SubscriptionStatus},
        },
    };

    use super::*;

    async fn user(pool: &SqlitePool, id: &str, referred_by: Option<String>) -> User {
        User::create(
            pool,
            &CreateUser {
                id: id.into(),
                email: format!("{id}@example.com"),
                phone: None,
                referred_by,
            },
            Utc::now(),
        )
        .await
        .unwrap()
    }

    async fn payment(pool: &SqlitePool, reference: &str, user_id: &str, amount: i64) {
        Payment::create(
            pool,
            &CreatePayment {
                reference: reference.into(),
                user_id: user_id.into(),
                email: format!("{user_id}@example.com"),
                amount,
                currency: "NGN".into(),
                plan: "pro".into(),
                coupon_code: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    }

    #[test]
    fn commission_is_a_tenth_rounded_down() {
        assert_eq!(referral_commission(100_000), 10_000);
        assert_eq!(referral_commission(99_999), 9_999);
        assert_eq!(referral_commission(9), 0);
        assert_eq!(referral_commission(i64::MAX), i64::MAX / 10);
    }

    #[tokio::test]
    async fn settlement_activates_pro_and_pays_referrer() {
        let db = DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;
        let referrer = user(pool, "ref", None).await;
        let buyer = user(pool, "buyer", Some(referrer.referral_code.clone())).await;
        payment(pool, "PAY-1", &buyer.id, 100_000).await;
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();

        let outcome = settle_successful_charge(pool, "PAY-1", 100_000, now).await.unwrap();
        assert_eq!(
            outcome,
            SettlementOutcome::Settled {
                user_id: buyer.id.clone(),
                expires_at: now + Duration::days(30),
                commission: Some(10_000),
            }
        );

        let buyer = User::find_by_id(pool, "buyer").await.unwrap().unwrap();
        assert_eq!(buyer.plan, Plan::Pro);
        assert_eq!(buyer.subscription_status, SubscriptionStatus::Active);
        assert_eq!(buyer.daily_build_limit, 9999);
        assert_eq!(buyer.monthly_token_limit, 1_000_000);

        let referrer = User::find_by_id(pool, "ref").await.unwrap().unwrap();
        assert_eq!(referrer.referral_earnings, 10_000);
        let rows = Referral::find_by_referrer(pool, "ref").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].commission_amount, 10_000);
        assert_eq!(rows[0].payment_reference, "PAY-1");

        let stats = AdminStats::get(pool).await.unwrap();
        assert_eq!(stats.total_revenue, 100_000);
        assert_eq!(stats.active_subscribers, 1);

        let payment = Payment::find_by_reference(pool, "PAY-1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.paid_at, Some(now));
    }

    #[tokio::test]
    async fn replayed_settlement_changes_nothing() {
        let db = DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;
        let referrer = user(pool, "ref", None).await;
        let buyer = user(pool, "buyer", Some(referrer.referral_code.clone())).await;
        payment(pool, "PAY-2", &buyer.id, 100_000).await;
        let now = Utc::now();

        settle_successful_charge(pool, "PAY-2", 100_000, now).await.unwrap();
        let again = settle_successful_charge(pool, "PAY-2", 100_000, now).await.unwrap();
        assert_eq!(again, SettlementOutcome::AlreadyProcessed);

        let stats = AdminStats::get(pool).await.unwrap();
        assert_eq!(stats.total_revenue, 100_000);
        assert_eq!(stats.active_subscribers, 1);
        let referrer = User::find_by_id(pool, "ref").await.unwrap().unwrap();
        assert_eq!(referrer.referral_earnings, 10_000);
        assert_eq!(Referral::find_by_referrer(pool, "ref").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn renewal_extends_and_does_not_double_count_subscriber() {
        let db = DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;
        let buyer = user(pool, "buyer", None).await;
        payment(pool, "PAY-A", &buyer.id, 100_000).await;
        payment(pool, "PAY-B", &buyer.id, 100_000).await;
        let first = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let second = first + Duration::days(20);

        settle_successful_charge(pool, "PAY-A", 100_000, first).await.unwrap();
        let outcome = settle_successful_charge(pool, "PAY-B", 100_000, second).await.unwrap();

        match outcome {
            SettlementOutcome::Settled {
                expires_at,
                commission,
                ..
            } => {
                assert_eq!(expires_at, first + Duration::days(60));
                assert_eq!(commission, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let stats = AdminStats::get(pool).await.unwrap();
        assert_eq!(stats.total_revenue, 200_000);
        assert_eq!(stats.active_subscribers, 1);
    }

    #[tokio::test]
    async fn unknown_reference_is_reported() {
        let db = DBService::new_in_memory().await.unwrap();
        let outcome = settle_successful_charge(&db.pool, "PAY-X", 1, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::UnknownPayment);
    }

    #[tokio::test]
    async fn failed_charge_only_closes_initialized_payments() {
        let db = DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;
        let buyer = user(pool, "buyer", None).await;
        payment(pool, "PAY-F", &buyer.id, 100_000).await;

        assert!(settle_unsuccessful_charge(pool, "PAY-F", PaymentStatus::Failed).await.unwrap());
        assert!(!settle_unsuccessful_charge(pool, "PAY-F", PaymentStatus::Abandoned).await.unwrap());
        let payment = Payment::find_by_reference(pool, "PAY-F").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
    }
}
