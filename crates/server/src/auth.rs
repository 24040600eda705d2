//! Bearer-token authentication. Tokens are HS256 JWTs issued by the identity
//! provider; `sub` is the user id.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use db::models::user::User;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
}

#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

/// Identity of the caller, taken from a verified bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized("Missing bearer token"))?;
        let claims = state.jwt().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ApiError::Unauthorized("Invalid or expired token")
        })?;
        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

/// An authenticated caller whose stored profile has the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let user = User::find_by_id(state.pool(), &auth.user_id)
            .await?
            .filter(User::is_admin)
            .ok_or_else(|| ApiError::Forbidden("Admin access required".to_string()))?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn token(secret: &[u8], exp: u64) -> String {
        let claims = Claims {
            sub: "user-1".into(),
            email: Some("u@example.com".into()),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn valid_token_yields_claims() {
        let verifier = JwtVerifier::new(b"secret");
        let claims = verifier.verify(&token(b"secret", far_future())).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("u@example.com"));
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let verifier = JwtVerifier::new(b"secret");
        assert!(verifier.verify(&token(b"other", far_future())).is_err());
        assert!(verifier.verify(&token(b"secret", 1_000)).is_err());
    }
}
