//! Authentication and authorization.
//!
//! Bearer tokens are HS256 JWTs whose subject is the username, carrying a
//! single role claim. Handlers never read ambient state: the caller is
//! resolved once by the [`CurrentUser`] extractor and passed explicitly into
//! the workflow operations.

pub mod password;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::AppState;

/// The two roles the API distinguishes. Gated routes require an exact match.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Role {
    Admin,
    User,
}

/// Claim structure for bearer tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the username
    pub sub: String,
    /// Role claim, exact-matched by gated routes
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Issues and validates bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    issuer: String,
    audience: String,
    lifetime_secs: u64,
}

impl AuthService {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            secret: cfg.jwt_secret.clone(),
            issuer: cfg.auth_issuer.clone(),
            audience: cfg.auth_audience.clone(),
            lifetime_secs: cfg.jwt_expiration_secs,
        }
    }

    /// Generate a token for a user.
    pub fn issue_token(&self, username: &str, role: &str) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.lifetime_secs as i64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token creation failed: {e}")))
    }

    /// Validate a token and extract its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token has expired".to_string())
            }
            _ => ServiceError::Unauthorized("Invalid token".to_string()),
        })?;

        Ok(data.claims)
    }
}

/// The authenticated caller, resolved from the bearer token's subject claim
/// against the users table.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role.parse().unwrap_or(Role::User)
    }

    /// Exact role match; no role implies another.
    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role() == role {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} role required",
                role
            )))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
        let claims = state.auth.verify_token(token)?;

        let user = user::Entity::find()
            .filter(user::Column::Username.eq(claims.sub.as_str()))
            .one(&*state.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Unknown token subject".to_string()))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService {
            secret: "unit-test-secret-key-that-is-long-enough".to_string(),
            issuer: "stagepass-api".to_string(),
            audience: "stagepass-clients".to_string(),
            lifetime_secs: 3600,
        }
    }

    #[test]
    fn token_round_trips_subject_and_role() {
        let svc = service();
        let token = svc.issue_token("alice", "User").expect("token");
        let claims = svc.verify_token(&token).expect("claims");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, "User");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let token = svc.issue_token("alice", "User").expect("token");
        let mut forged = token.clone();
        forged.pop();
        assert!(svc.verify_token(&forged).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let svc = service();
        let other = AuthService {
            secret: "a-different-secret-key-also-long-enough!".to_string(),
            ..service()
        };
        let token = other.issue_token("mallory", "Admin").expect("token");
        assert!(svc.verify_token(&token).is_err());
    }

    #[test]
    fn role_parsing_is_exact() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }
}
