use std::time::Duration;

use db::DBService;
use secrecy::ExposeSecret;
use services::services::{
    ai_client::AiClient,
    billing::BillingService,
    deployments::DeploymentService,
    paystack::PaystackClient,
    project_builder::ProjectBuilder,
    project_planner::ProjectPlanner,
    vercel::VercelClient,
    webhook::WebhookProcessor,
};
use sqlx::SqlitePool;

use crate::{auth::JwtVerifier, config::Config};

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    ai: AiClient,
    paystack: PaystackClient,
    vercel: VercelClient,
    jwt: JwtVerifier,
    pro_price_kobo: i64,
    app_url: String,
    request_timeout: Duration,
}

impl AppState {
    pub fn from_config(db: DBService, config: &Config) -> anyhow::Result<Self> {
        let ai = AiClient::new(
            config.ai_keys.clone(),
            config.ai_base_url.clone(),
            config.ai_model.clone(),
        )?;
        let paystack = PaystackClient::new(
            config.paystack_secret_key.expose_secret().to_string(),
            config.paystack_base_url.clone(),
        )?;
        let vercel = VercelClient::new(config.vercel_token.clone(), config.vercel_base_url.clone())?;
        Ok(Self {
            db,
            ai,
            paystack,
            vercel,
            jwt: JwtVerifier::new(config.jwt_secret.expose_secret().as_bytes()),
            pro_price_kobo: config.pro_price_kobo,
            app_url: config.app_url.clone(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub fn jwt(&self) -> &JwtVerifier {
        &self.jwt
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn planner(&self) -> ProjectPlanner {
        ProjectPlanner::new(self.db.pool.clone(), self.ai.clone())
    }

    pub fn builder(&self) -> ProjectBuilder {
        ProjectBuilder::new(self.db.pool.clone(), self.ai.clone())
    }

    pub fn billing(&self) -> BillingService {
        BillingService::new(
            self.db.pool.clone(),
            self.paystack.clone(),
            self.pro_price_kobo,
            &self.app_url,
        )
    }

    pub fn webhooks(&self) -> WebhookProcessor {
        WebhookProcessor::new(self.db.pool.clone(), self.paystack.secret_key())
    }

    pub fn deployments(&self) -> DeploymentService {
        DeploymentService::new(self.db.pool.clone(), self.vercel.clone())
    }
}
