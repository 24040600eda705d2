//! Paystack transaction API client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Clone, Error)]
pub enum PaystackError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("invalid secret key")]
    Unauthorized,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("paystack rejected the request: {0}")]
    Rejected(String),
    #[error("json error: {0}")]
    Serde(String),
}

/// Every Paystack response is wrapped in this envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    pub amount: i64, // kobo
    pub reference: String,
    pub callback_url: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InitializeData {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyData {
    pub reference: String,
    /// `success`, `failed`, `abandoned`, `ongoing`, `pending`, ...
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(secret_key: String, base_url: Option<String>) -> Result<Self, PaystackError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaystackError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            secret_key,
        })
    }

    /// The secret key also signs webhook payloads
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub async fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializeData, PaystackError> {
        debug!(reference = %request.reference, amount = request.amount, "Initializing Paystack transaction");
        let builder = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .json(request);
        self.send(builder).await
    }

    pub async fn verify(&self, reference: &str) -> Result<VerifyData, PaystackError> {
        let builder = self
            .http
            .get(format!("{}/transaction/verify/{reference}", self.base_url));
        self.send(builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, PaystackError> {
        let res = builder
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PaystackError::Unauthorized);
        }
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            let body = res.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Paystack API error");
            return Err(PaystackError::Http {
                status: status.as_u16(),
                body,
            });
        }

        // 400s still carry the envelope with a readable message
        let envelope = res
            .json::<Envelope<T>>()
            .await
            .map_err(|e| PaystackError::Serde(e.to_string()))?;
        match envelope {
            Envelope {
                status: true,
                data: Some(data),
                ..
            } => Ok(data),
            Envelope { message, .. } => Err(PaystackError::Rejected(message)),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> PaystackError {
    if e.is_timeout() {
        PaystackError::Timeout
    } else {
        PaystackError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn initialize_sends_bearer_and_returns_checkout() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/transaction/initialize")
                    .header("authorization", "Bearer sk_test_1")
                    .json_body_partial(r#"{"amount": 90000, "reference": "PAY-ABC"}"#);
                then.status(200).json_body(json!({
                    "status": true,
                    "message": "Authorization URL created",
                    "data": {
                        "authorization_url": "https://checkout.paystack.com/abc",
                        "access_code": "abc",
                        "reference": "PAY-ABC"
                    }
                }));
            })
            .await;

        let client = PaystackClient::new("sk_test_1".into(), Some(server.base_url())).unwrap();
        let data = client
            .initialize(&InitializeRequest {
                email: "a@b.co".into(),
                amount: 90_000,
                reference: "PAY-ABC".into(),
                callback_url: "http://app/dashboard".into(),
                metadata: json!({"plan": "pro"}),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(data.authorization_url, "https://checkout.paystack.com/abc");
    }

    #[tokio::test]
    async fn rejected_envelope_surfaces_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/transaction/verify/PAY-NONE");
                then.status(400)
                    .json_body(json!({"status": false, "message": "Transaction reference not found"}));
            })
            .await;

        let client = PaystackClient::new("sk".into(), Some(server.base_url())).unwrap();
        let err = client.verify("PAY-NONE").await.unwrap_err();
        match err {
            PaystackError::Rejected(message) => {
                assert_eq!(message, "Transaction reference not found")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
