//! Client for OpenAI-compatible chat completion APIs.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{error, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Error)]
pub enum AiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("no AI API keys configured")]
    NoApiKeys,
    #[error("AI service unavailable: every configured key failed")]
    AllKeysFailed,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

impl ChatResponse {
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }

    pub fn total_tokens(&self) -> i64 {
        self.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
    }
}

/// Parsed JSON answer together with the tokens it cost
#[derive(Debug)]
pub struct JsonCompletion<T> {
    pub value: T,
    pub total_tokens: i64,
}

/// Chat completion client holding one or more API keys. Keys are tried in
/// order on every request; the first one that answers wins.
#[derive(Debug, Clone)]
pub struct AiClient {
    http: Client,
    base_url: String,
    api_keys: Vec<String>,
    model: String,
}

impl AiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

    pub fn new(
        api_keys: Vec<String>,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("chibot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_keys: api_keys.into_iter().filter(|k| !k.is_empty()).collect(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Send a completion request, failing over through the configured keys
    pub async fn complete(&self, messages: Vec<Message>) -> Result<ChatResponse, AiError> {
        if self.api_keys.is_empty() {
            return Err(AiError::NoApiKeys);
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        for (slot, key) in self.api_keys.iter().enumerate() {
            match self.send_request(key, &request).await {
                Ok(response) => return Ok(response),
                Err(e) => warn!(slot = slot + 1, error = %e, "AI key failed"),
            }
        }

        error!(keys = self.api_keys.len(), "All AI keys failed");
        Err(AiError::AllKeysFailed)
    }

    async fn send_request(&self, key: &str, request: &ChatRequest) -> Result<ChatResponse, AiError> {
        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ChatResponse>()
                .await
                .map_err(|e| AiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(AiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(AiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(AiError::Http { status, body })
            }
        }
    }

    /// Send a prompt expecting a JSON object back
    pub async fn ask_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<JsonCompletion<T>, AiError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        let response = self.complete(messages).await?;
        let total_tokens = response.total_tokens();
        let text = response
            .text()
            .ok_or_else(|| AiError::Serde("No text content in response".to_string()))?;

        if text.trim().is_empty() {
            error!("AI returned an empty response");
            return Err(AiError::Serde("Empty response from AI".to_string()));
        }

        let json_str = extract_json(text);
        let value = serde_json::from_str(json_str).map_err(|e| {
            error!(
                json_error = %e,
                response_length = text.len(),
                extracted_json_preview = %json_str.chars().take(500).collect::<String>(),
                "Failed to parse JSON response from AI"
            );
            AiError::Serde(e.to_string())
        })?;

        Ok(JsonCompletion {
            value,
            total_tokens,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Transport(e.to_string())
    }
}

/// Extract JSON from a string that might contain markdown code blocks
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip past any language identifier on the same line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}
