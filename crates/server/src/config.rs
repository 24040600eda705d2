//! Server configuration, read from the environment.

use std::{net::SocketAddr, time::Duration};

use secrecy::SecretString;
use services::services::billing::DEFAULT_PRO_PRICE_KOBO;

pub const AI_KEY_SLOTS: usize = 5;
/// Upper bound on the configured Pro price, 100 million naira in kobo
pub const MAX_PRO_PRICE_KOBO: i64 = 10_000_000_000;

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub jwt_secret: SecretString,
    pub ai_keys: Vec<String>,
    pub ai_base_url: Option<String>,
    pub ai_model: Option<String>,
    pub paystack_secret_key: SecretString,
    pub paystack_base_url: Option<String>,
    pub app_url: String,
    pub vercel_token: Option<String>,
    pub vercel_base_url: Option<String>,
    pub pro_price_kobo: i64,
    pub request_timeout: Duration,
    pub sentry_dsn: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://data.db?mode=rwc".to_string());

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = get("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PORT"))?;
        let listen_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid("HOST"))?;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let paystack_secret_key =
            get("PAYSTACK_SECRET_KEY").ok_or(ConfigError::Missing("PAYSTACK_SECRET_KEY"))?;

        let ai_keys = (1..=AI_KEY_SLOTS)
            .filter_map(|slot| get(&format!("AI_KEY_{slot}")))
            .collect();

        let pro_price_kobo: i64 = get("PRO_PRICE_KOBO")
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| ConfigError::Invalid("PRO_PRICE_KOBO"))?
            .unwrap_or(DEFAULT_PRO_PRICE_KOBO);
        if !(1..=MAX_PRO_PRICE_KOBO).contains(&pro_price_kobo) {
            return Err(ConfigError::Invalid("PRO_PRICE_KOBO"));
        }

        let request_timeout_secs: u64 = get("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "300".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        Ok(Self {
            database_url,
            listen_addr,
            jwt_secret: SecretString::from(jwt_secret),
            ai_keys,
            ai_base_url: get("AI_BASE_URL"),
            ai_model: get("AI_MODEL"),
            paystack_secret_key: SecretString::from(paystack_secret_key),
            paystack_base_url: get("PAYSTACK_BASE_URL"),
            app_url: get("APP_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            vercel_token: get("VERCEL_TOKEN"),
            vercel_base_url: get("VERCEL_BASE_URL"),
            pro_price_kobo,
            request_timeout: Duration::from_secs(request_timeout_secs),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }
}
