/*!
 * # Authentication
 *
 * Issues and verifies HS256 JWTs for registered users and resolves the
 * bearer token on incoming requests into an [`AuthenticatedUser`].
 *
 * Tokens carry the user id in `sub` and a `type` claim. Only `ACCESS` tokens
 * authenticate API calls; `REFRESH` tokens are issued alongside for clients
 * that renew sessions.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::User;
use crate::AppState;

pub mod password;

/// Kind of token, stored in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration as u64),
            refresh_token_expiration: Duration::from_secs(cfg.refresh_token_expiration as u64),
        }
    }
}

/// A signed token and when it stops being accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Token pair returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: TokenInfo,
    pub refresh: TokenInfo,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token type")]
    WrongTokenType,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::TokenExpired => {
                ServiceError::Unauthorized("Please authenticate".to_string())
            }
            AuthError::WrongTokenType => {
                ServiceError::Unauthorized("Invalid token type".to_string())
            }
            AuthError::InvalidCredentials => {
                ServiceError::Unauthorized("Incorrect email or password".to_string())
            }
            AuthError::TokenCreation(_) | AuthError::PasswordHash(_) => {
                ServiceError::InternalError(err.to_string())
            }
        }
    }
}

/// Issues and validates tokens. Holds no per-user state.
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn sign(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<TokenInfo, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(lifetime)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenInfo { token, expires })
    }

    /// Generate an access/refresh token pair for a user
    pub fn generate_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        Ok(AuthTokens {
            access: self.sign(
                user.id,
                TokenType::Access,
                self.config.access_token_expiration,
            )?,
            refresh: self.sign(
                user.id,
                TokenType::Refresh,
                self.config.refresh_token_expiration,
            )?,
        })
    }

    /// Validate a JWT and check it is of the expected type
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
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
        .filter(|token| !token.is_empty())
}

/// The user behind a valid `ACCESS` bearer token, freshly loaded from the store.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        let claims = state.auth.validate_token(token, TokenType::Access)?;
        let user_id = claims.user_id()?;

        match state.services.users.get_user_by_id(user_id).await {
            Ok(user) => Ok(AuthenticatedUser(user)),
            Err(ServiceError::NotFound(_)) => {
                debug!(%user_id, "token subject no longer exists");
                Err(ServiceError::Unauthorized("Please authenticate".to_string()))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Email, NewUser};
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: crate::config::DEV_DEFAULT_JWT_SECRET.to_string(),
            jwt_audience: "qkart-auth".into(),
            jwt_issuer: "qkart-api".into(),
            access_token_expiration: Duration::from_secs(600),
            refresh_token_expiration: Duration::from_secs(3600),
        })
    }

    fn user() -> User {
        NewUser {
            name: "crio-user".into(),
            email: Email::parse("crio-user@gmail.com").unwrap(),
            password_hash: String::new(),
            wallet_money: Decimal::from(500),
            address: "ADDRESS_NOT_SET".into(),
        }
        .into_user()
    }

    #[test]
    fn access_token_round_trips_subject() {
        let auth = service();
        let user = user();
        let tokens = auth.generate_tokens(&user).unwrap();

        let claims = auth
            .validate_token(&tokens.access.token, TokenType::Access)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert!(tokens.refresh.expires > tokens.access.expires);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let auth = service();
        let tokens = auth.generate_tokens(&user()).unwrap();
        assert_matches!(
            auth.validate_token(&tokens.refresh.token, TokenType::Access),
            Err(AuthError::WrongTokenType)
        );
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let tokens = service().generate_tokens(&user()).unwrap();
        let other = AuthService::new(AuthConfig {
            jwt_secret: "a-completely-different-secret-value-used-only-by-this-unit-test-xyz".into(),
            ..service().config
        });
        assert_matches!(
            other.validate_token(&tokens.access.token, TokenType::Access),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn auth_errors_map_to_client_messages() {
        assert_eq!(
            ServiceError::from(AuthError::WrongTokenType).response_message(),
            "Invalid token type"
        );
        assert_eq!(
            ServiceError::from(AuthError::InvalidToken).response_message(),
            "Please authenticate"
        );
    }
}
