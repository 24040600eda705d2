//! Checkout: pricing, coupons and Paystack transaction setup/verification.

use chrono::{DateTime, Utc};
use db::models::{
    coupon::Coupon,
    payment::{CreatePayment, Payment, PaymentStatus},
    user::User,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    paystack::{InitializeData, InitializeRequest, PaystackClient, PaystackError},
    settlement::{self, SettlementOutcome},
};

pub const DEFAULT_PRO_PRICE_KOBO: i64 = 100_000;
pub const CURRENCY: &str = "NGN";
const REFERENCE_SUFFIX_LEN: usize = 13;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("payment gateway error: {0}")]
    Gateway(#[from] PaystackError),
    #[error("unsupported plan: {0}")]
    UnsupportedPlan(String),
    #[error("coupon would make the payment free")]
    NothingToCharge,
    #[error("payment not found")]
    PaymentNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PaymentInitialization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
    pub amount: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
}

/// Price after any coupon, and the coupon that was consumed for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedPlan {
    pub amount: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PaymentVerification {
    pub payment: Payment,
    pub gateway_status: String,
}

/// `PAY-` followed by 13 uppercase alphanumerics
pub fn generate_reference() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(REFERENCE_SUFFIX_LEN)
        .collect();
    format!("PAY-{}", suffix.to_ascii_uppercase())
}

#[derive(Clone)]
pub struct BillingService {
    pool: SqlitePool,
    paystack: PaystackClient,
    pro_price: i64,
    callback_url: String,
}

impl BillingService {
    pub fn new(pool: SqlitePool, paystack: PaystackClient, pro_price: i64, app_url: &str) -> Self {
        Self {
            pool,
            paystack,
            pro_price,
            callback_url: format!("{}/dashboard", app_url.trim_end_matches('/')),
        }
    }

    pub fn price_for(&self, plan: &str) -> Result<i64, BillingError> {
        match plan {
            "pro" => Ok(self.pro_price),
            other => Err(BillingError::UnsupportedPlan(other.to_string())),
        }
    }

    /// Apply `coupon_code` to `amount`. A coupon that does not apply is
    /// ignored; one that applies is consumed.
    pub async fn apply_coupon(
        &self,
        amount: i64,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PricedPlan, BillingError> {
        let full_price = PricedPlan {
            amount,
            discount: 0,
            coupon_code: None,
        };
        let Some(code) = coupon_code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(full_price);
        };
        let code = code.to_ascii_uppercase();

        let coupon = match Coupon::find_active_by_code(&self.pool, &code).await? {
            Some(coupon) if coupon.is_redeemable(now) => coupon,
            _ => {
                info!(coupon = %code, "Coupon not applicable, charging full price");
                return Ok(full_price);
            }
        };

        let discount = coupon.discount_for(amount);
        if amount - discount <= 0 {
            return Err(BillingError::NothingToCharge);
        }
        if !Coupon::try_redeem(&self.pool, coupon.id).await? {
            info!(coupon = %code, "Coupon ran out while applying, charging full price");
            return Ok(full_price);
        }

        Ok(PricedPlan {
            amount: amount - discount,
            discount,
            coupon_code: Some(coupon.code),
        })
    }

    pub async fn initialize_payment(
        &self,
        user: &User,
        plan: &str,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PaymentInitialization, BillingError> {
        let base = self.price_for(plan)?;
        let priced = self.apply_coupon(base, coupon_code, now).await?;
        let reference = generate_reference();

        let checkout = match self.start_checkout(user, plan, &priced, &reference, now).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(user_id = %user.id, reference = %reference, error = %e, "Checkout failed to start");
                self.abandon_checkout(&priced, &reference).await?;
                return Err(e);
            }
        };

        info!(
            user_id = %user.id,
            reference = %reference,
            amount = priced.amount,
            discount = priced.discount,
            "Payment initialized"
        );

        Ok(PaymentInitialization {
            authorization_url: checkout.authorization_url,
            access_code: checkout.access_code,
            reference,
            amount: priced.amount,
            discount: priced.discount,
            coupon_code: priced.coupon_code,
        })
    }

    async fn start_checkout(
        &self,
        user: &User,
        plan: &str,
        priced: &PricedPlan,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<InitializeData, BillingError> {
        Payment::create(
            &self.pool,
            &CreatePayment {
                reference: reference.to_string(),
                user_id: user.id.clone(),
                email: user.email.clone(),
                amount: priced.amount,
                currency: CURRENCY.to_string(),
                plan: plan.to_string(),
                coupon_code: priced.coupon_code.clone(),
            },
            now,
        )
        .await?;

        Ok(self
            .paystack
            .initialize(&InitializeRequest {
                email: user.email.clone(),
                amount: priced.amount,
                reference: reference.to_string(),
                callback_url: self.callback_url.clone(),
                metadata: json!({
                    "user_id": user.id,
                    "plan": plan,
                    "reference": reference,
                }),
            })
            .await?)
    }

    /// Undo a checkout the gateway never accepted: the payment row is failed
    /// and the coupon use returned.
    async fn abandon_checkout(&self, priced: &PricedPlan, reference: &str) -> Result<(), BillingError> {
        Payment::transition_from_initialized(&self.pool, reference, PaymentStatus::Failed, None)
            .await?;
        if let Some(code) = priced.coupon_code.as_deref() {
            Coupon::release(&self.pool, code).await?;
        }
        Ok(())
    }

    /// Ask the gateway about `reference` and settle it the same way the
    /// webhook would.
    pub async fn verify_payment(
        &self,
        user_id: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentVerification, BillingError> {
        let payment = Payment::find_by_reference(&self.pool, reference)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or(BillingError::PaymentNotFound)?;

        if payment.status == PaymentStatus::Initialized {
            let verified = self.paystack.verify(reference).await?;
            match verified.status.as_str() {
                "success" => {
                    let outcome = settlement::settle_successful_charge(
                        &self.pool,
                        reference,
                        verified.amount,
                        now,
                    )
                    .await?;
                    if let SettlementOutcome::Settled { .. } = outcome {
                        info!(reference = %reference, "Payment settled by verification");
                    }
                }
                "failed" => {
                    settlement::settle_unsuccessful_charge(&self.pool, reference, PaymentStatus::Failed)
                        .await?;
                }
                "abandoned" => {
                    settlement::settle_unsuccessful_charge(
                        &self.pool,
                        reference,
                        PaymentStatus::Abandoned,
                    )
                    .await?;
                }
                _ => {}
            }
            let payment = Payment::find_by_reference(&self.pool, reference)
                .await?
                .ok_or(BillingError::PaymentNotFound)?;
            return Ok(PaymentVerification {
                payment,
                gateway_status: verified.status,
            });
        }

        Ok(PaymentVerification {
            gateway_status: payment.status.to_string(),
            payment,
        })
    }
}
