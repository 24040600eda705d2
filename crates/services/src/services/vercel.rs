//! Minimal Vercel deployments API client.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.vercel.com";

#[derive(Debug, Clone, Error)]
pub enum VercelError {
    #[error("deployments are not configured: VERCEL_TOKEN is not set")]
    NotConfigured,
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("invalid vercel token")]
    Unauthorized,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
}

#[derive(Debug, Serialize)]
struct DeploymentFile<'a> {
    file: &'a str,
    data: String,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct ProjectSettings {
    framework: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateDeployment<'a> {
    name: &'a str,
    files: Vec<DeploymentFile<'a>>,
    #[serde(rename = "projectSettings")]
    project_settings: ProjectSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedDeployment {
    pub id: String,
    pub url: String,
    #[serde(default, rename = "readyState")]
    pub ready_state: Option<String>,
}

impl CreatedDeployment {
    pub fn public_url(&self) -> String {
        if self.url.starts_with("http") {
            self.url.clone()
        } else {
            format!("https://{}", self.url)
        }
    }
}

#[derive(Debug, Clone)]
pub struct VercelClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl VercelClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(token: Option<String>, base_url: Option<String>) -> Result<Self, VercelError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VercelError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Upload `files` as `(path, content)` pairs in a single deployment
    pub async fn deploy<'a, I>(&self, name: &str, files: I) -> Result<CreatedDeployment, VercelError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let token = self.token.as_deref().ok_or(VercelError::NotConfigured)?;
        let body = CreateDeployment {
            name,
            files: files
                .into_iter()
                .map(|(path, content)| DeploymentFile {
                    file: path,
                    data: STANDARD.encode(content.as_bytes()),
                    encoding: "base64",
                })
                .collect(),
            project_settings: ProjectSettings { framework: "nextjs" },
        };

        let res = self
            .http
            .post(format!("{}/v13/deployments", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VercelError::Timeout
                } else {
                    VercelError::Transport(e.to_string())
                }
            })?;

        match res.status() {
            s if s.is_success() => res
                .json::<CreatedDeployment>()
                .await
                .map_err(|e| VercelError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VercelError::Unauthorized),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(VercelError::Http { status, body })
            }
        }
    }
}
