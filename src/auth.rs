//! Session tokens and role guards.
//!
//! Logins exchange a provider token for an HS256 session token signed with
//! `JWT_SECRET_KEY`. Handlers declare the access they need by taking one of
//! the extractors below as an argument.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{Role, User};

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User email
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
    /// Token id
    pub jti: String,
}

impl Claims {
    pub fn email(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.email.clone(),
            user_id: user.user_id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(format!("Failed to sign session token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                AppError::Unauthorized(INVALID_CREDENTIALS.to_string())
            })
    }
}

/// Role for a user created on first login.
///
/// Bootstrap admins (listed in `ADMIN_EMAILS`) and the very first user get
/// `admin`; everyone else starts as `agent`.
pub fn determine_initial_role(email: &str, admin_emails: &[String], existing_users: i64) -> Role {
    let email = email.to_lowercase();
    if existing_users == 0 || admin_emails.iter().any(|admin| *admin == email) {
        Role::Admin
    } else {
        Role::Agent
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any caller with a valid session token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Callers with the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

/// Callers with the `agent` role.
#[derive(Debug, Clone)]
pub struct AgentUser(pub Claims);

/// Optional authentication: missing or invalid tokens yield `None`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Claims>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        state.sessions.verify(token).map(AuthUser)
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            tracing::warn!("User {} denied admin access", claims.user_id);
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(claims))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AgentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_agent() {
            tracing::warn!("User {} denied agent access", claims.user_id);
            return Err(AppError::Forbidden("Agent access required".to_string()));
        }
        Ok(AgentUser(claims))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(parts).and_then(|token| state.sessions.verify(token).ok());
        Ok(MaybeAuthUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            user_id: 42,
            email: "agent@realty.example".to_string(),
            name: "Alex Agent".to_string(),
            role,
            profile_picture: None,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn session_token_round_trips_claims() {
        let keys = SessionKeys::new("test-secret-at-least-16", Duration::minutes(30));
        let token = keys.issue(&user(Role::Agent)).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, "agent@realty.example");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, Role::Agent);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new("test-secret-at-least-16", Duration::minutes(-10));
        let token = keys.issue(&user(Role::Admin)).unwrap();

        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == INVALID_CREDENTIALS));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let ours = SessionKeys::new("test-secret-at-least-16", Duration::minutes(30));
        let theirs = SessionKeys::new("another-secret-value!", Duration::minutes(30));
        let token = theirs.issue(&user(Role::Admin)).unwrap();

        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn first_user_and_listed_emails_become_admin() {
        let admins = vec!["boss@realty.example".to_string()];

        assert_eq!(determine_initial_role("new@realty.example", &admins, 0), Role::Admin);
        assert_eq!(determine_initial_role("Boss@Realty.example", &admins, 12), Role::Admin);
        assert_eq!(determine_initial_role("new@realty.example", &admins, 12), Role::Agent);
    }
}
