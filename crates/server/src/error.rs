use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    account::AccountError,
    ai_client::AiError,
    billing::BillingError,
    deployments::DeploymentError,
    paystack::PaystackError,
    project_builder::ProjectBuildError,
    project_planner::ProjectPlannerError,
    usage::UsageError,
    vercel::VercelError,
    webhook::WebhookError,
};
use utils::response::ApiResponse;

pub const PROFILE_MISSING: &str = "User profile not found. Sign up first.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal server error".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::warn!(status = %status, error = %other, "Upstream failure");
                }
                other.to_string()
            }
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NoApiKeys | AiError::AllKeysFailed => {
                ApiError::ServiceUnavailable("AI service unavailable".to_string())
            }
            AiError::Serde(e) => ApiError::BadGateway(format!("AI returned invalid JSON: {e}")),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::Database(e) => ApiError::Database(e),
            UsageError::UserNotFound => ApiError::NotFound(PROFILE_MISSING.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Database(e) => ApiError::Database(e),
            e @ AccountError::AlreadyRegistered => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<ProjectPlannerError> for ApiError {
    fn from(err: ProjectPlannerError) -> Self {
        match err {
            ProjectPlannerError::Database(e) => ApiError::Database(e),
            ProjectPlannerError::Ai(e) => e.into(),
            ProjectPlannerError::NotFound => ApiError::NotFound("Project not found".to_string()),
            e @ ProjectPlannerError::InvalidStatus(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<ProjectBuildError> for ApiError {
    fn from(err: ProjectBuildError) -> Self {
        match err {
            ProjectBuildError::Database(e) => ApiError::Database(e),
            ProjectBuildError::Ai(e) => e.into(),
            ProjectBuildError::Usage(e) => e.into(),
            ProjectBuildError::NotFound => ApiError::NotFound("Project not found".to_string()),
            ProjectBuildError::Denied(reason) => ApiError::Forbidden(reason),
            e @ ProjectBuildError::MissingPlan => ApiError::BadRequest(e.to_string()),
            e @ ProjectBuildError::InvalidStatus(_) => ApiError::Conflict(e.to_string()),
            e @ ProjectBuildError::EmptyOutput => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<PaystackError> for ApiError {
    fn from(err: PaystackError) -> Self {
        match err {
            PaystackError::Rejected(message) => ApiError::BadGateway(message),
            other => ApiError::BadGateway(format!("Payment gateway error: {other}")),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Database(e) => ApiError::Database(e),
            BillingError::Gateway(e) => e.into(),
            e @ (BillingError::UnsupportedPlan(_) | BillingError::NothingToCharge) => {
                ApiError::BadRequest(e.to_string())
            }
            BillingError::PaymentNotFound => ApiError::NotFound("Payment not found".to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Database(e) => ApiError::Database(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<VercelError> for ApiError {
    fn from(err: VercelError) -> Self {
        match err {
            e @ VercelError::NotConfigured => ApiError::ServiceUnavailable(e.to_string()),
            other => ApiError::BadGateway(format!("Deployment failed: {other}")),
        }
    }
}

impl From<DeploymentError> for ApiError {
    fn from(err: DeploymentError) -> Self {
        match err {
            DeploymentError::Database(e) => ApiError::Database(e),
            DeploymentError::Vercel(e) => e.into(),
            DeploymentError::NotFound => ApiError::NotFound("Project not found".to_string()),
            e @ DeploymentError::NoFiles => ApiError::BadRequest(e.to_string()),
        }
    }
}
