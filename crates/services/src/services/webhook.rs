//! Paystack webhook verification and dispatch.

use chrono::{DateTime, Utc};
use db::models::payment::PaymentStatus;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::settlement::{self, SettlementOutcome};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing x-paystack-signature header")]
    MissingSignature,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    Malformed(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Webhook event types we act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    ChargeSuccess,
    ChargeFailed,
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "charge.success" => Self::ChargeSuccess,
            "charge.failed" => Self::ChargeFailed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl ChargeData {
    /// Our reference, preferring the gateway's copy over the one echoed in metadata
    fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .filter(|r| !r.is_empty())
            .or_else(|| self.metadata.get("reference").and_then(|r| r.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Settled(SettlementOutcome),
    Failed { reference: String, changed: bool },
    Ignored(String),
}

pub fn compute_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` (hex HMAC-SHA512 of the raw body) in constant time
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSignature)?;
    let expected = compute_signature(secret, body).ok_or(WebhookError::InvalidSignature)?;
    let provided = signature.to_ascii_lowercase();
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        warn!("Webhook signature verification failed");
        Err(WebhookError::InvalidSignature)
    }
}

#[derive(Clone)]
pub struct WebhookProcessor {
    pool: SqlitePool,
    secret: String,
}

impl WebhookProcessor {
    pub fn new(pool: SqlitePool, secret: impl Into<String>) -> Self {
        Self {
            pool,
            secret: secret.into(),
        }
    }

    /// Verify the payload and apply the event. Nothing is read from the body
    /// before the signature checks out.
    #[instrument(skip(self, body, signature))]
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, WebhookError> {
        verify_signature(&self.secret, body, signature)?;

        let raw: RawEvent =
            serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;
        debug!(event = %raw.event, "Parsed webhook event");

        match WebhookEventType::from(raw.event.as_str()) {
            WebhookEventType::ChargeSuccess => {
                let charge = parse_charge(raw.data)?;
                let reference = charge
                    .reference()
                    .ok_or_else(|| WebhookError::Malformed("charge has no reference".into()))?
                    .to_string();
                let amount = match charge.amount {
                    Some(amount) => amount,
                    None => return Err(WebhookError::Malformed("charge has no amount".into())),
                };
                let outcome =
                    settlement::settle_successful_charge(&self.pool, &reference, amount, now)
                        .await?;
                Ok(WebhookOutcome::Settled(outcome))
            }
            WebhookEventType::ChargeFailed => {
                let charge = parse_charge(raw.data)?;
                let reference = charge
                    .reference()
                    .ok_or_else(|| WebhookError::Malformed("charge has no reference".into()))?
                    .to_string();
                let changed = settlement::settle_unsuccessful_charge(
                    &self.pool,
                    &reference,
                    PaymentStatus::Failed,
                )
                .await?;
                Ok(WebhookOutcome::Failed { reference, changed })
            }
            WebhookEventType::Unknown(event) => {
                info!(event = %event, "Ignoring webhook event");
                Ok(WebhookOutcome::Ignored(event))
            }
        }
    }
}

fn parse_charge(data: serde_json::Value) -> Result<ChargeData, WebhookError> {
    serde_json::from_value(data).map_err(|e| WebhookError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            admin_stats::AdminStats,
            payment::{CreatePayment, Payment},
            user::{CreateUser, Plan, User},
        },
    };
    use serde_json::json;

    use super::*;

    const SECRET: &str = "sk_test_secret";

    async fn setup() -> SqlitePool {
        let db = DBService::new_in_memory().await.unwrap();
        User::create(
            &db.pool,
            &CreateUser {
                id: "payer".into(),
                email: "payer@example.com".into(),
                phone: None,
                referred_by: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        Payment::create(
            &db.pool,
            &CreatePayment {
                reference: "PAY-WEBHOOK00001".into(),
                user_id: "payer".into(),
                email: "payer@example.com".into(),
                amount: 100_000,
                currency: "NGN".into(),
                plan: "pro".into(),
                coupon_code: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        db.pool
    }

    fn charge_body(event: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event": event,
            "data": {
                "reference": "PAY-WEBHOOK00001",
                "amount": 100_000,
                "metadata": { "user_id": "payer", "plan": "pro", "reference": "PAY-WEBHOOK00001" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn signature_roundtrip_and_tamper() {
        let body = br#"{"event":"charge.success"}"#;
        let sig = compute_signature(SECRET, body).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify_signature(SECRET, body, Some(&sig)).is_ok());
        assert!(verify_signature(SECRET, body, Some(&sig.to_uppercase())).is_ok());

        let tampered = br#"{"event":"charge.failed"}"#;
        assert!(matches!(
            verify_signature(SECRET, tampered, Some(&sig)),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("other", body, Some(&sig)),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET, body, None),
            Err(WebhookError::MissingSignature)
        ));
    }

    #[tokio::test]
    async fn bad_signature_changes_nothing() {
        let pool = setup().await;
        let processor = WebhookProcessor::new(pool.clone(), SECRET);
        let body = charge_body("charge.success");

        let err = processor
            .handle(&body, Some("deadbeef"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));

        let payment = Payment::find_by_reference(&pool, "PAY-WEBHOOK00001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Initialized);
        let user = User::find_by_id(&pool, "payer").await.unwrap().unwrap();
        assert_eq!(user.plan, Plan::Free);
    }

    #[tokio::test]
    async fn signed_charge_success_settles_once() {
        let pool = setup().await;
        let processor = WebhookProcessor::new(pool.clone(), SECRET);
        let body = charge_body("charge.success");
        let sig = compute_signature(SECRET, &body).unwrap();

        let first = processor.handle(&body, Some(&sig), Utc::now()).await.unwrap();
        assert!(matches!(
            first,
            WebhookOutcome::Settled(SettlementOutcome::Settled { .. })
        ));
        let replay = processor.handle(&body, Some(&sig), Utc::now()).await.unwrap();
        assert_eq!(
            replay,
            WebhookOutcome::Settled(SettlementOutcome::AlreadyProcessed)
        );

        let stats = AdminStats::get(&pool).await.unwrap();
        assert_eq!(stats.total_revenue, 100_000);
        assert_eq!(stats.active_subscribers, 1);
    }

    #[tokio::test]
    async fn charge_failed_marks_payment_failed() {
        let pool = setup().await;
        let processor = WebhookProcessor::new(pool.clone(), SECRET);
        let body = charge_body("charge.failed");
        let sig = compute_signature(SECRET, &body).unwrap();

        let outcome = processor.handle(&body, Some(&sig), Utc::now()).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Failed {
                reference: "PAY-WEBHOOK00001".into(),
                changed: true
            }
        );
    }

    #[tokio::test]
    async fn other_events_are_acknowledged() {
        let pool = setup().await;
        let processor = WebhookProcessor::new(pool, SECRET);
        let body = br#"{"event":"transfer.success","data":{}}"#;
        let sig = compute_signature(SECRET, body).unwrap();

        let outcome = processor.handle(body, Some(&sig), Utc::now()).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("transfer.success".into()));
    }
}
