//! Bearer tokens for signed-in shoppers.
//!
//! Tokens are HS256 JWTs carrying the user id, email and username. The
//! storefront only ever sees the `AuthService` trait, so tests and the demo
//! binary can swap in other issuers.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::user::{User, UserId};

const MIN_SECRET_LEN: usize = 32;
const DEV_SECRET: &str = "mystic-market-dev-secret-not-for-production";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access token required")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    Expired,
    #[error("{0}")]
    Token(String),
    #[error("{0}")]
    Config(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

/// Identity recovered from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
}

pub trait AuthService {
    fn issue(&self, user: &User) -> Result<String, AuthError>;
    fn verify(&self, credential: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[derive(Clone)]
pub struct JwtAuth {
    secret: String,
    expiry_seconds: u64,
}

impl JwtAuth {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "JWT secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    pub fn new_dev() -> Self {
        Self {
            secret: DEV_SECRET.to_string(),
            expiry_seconds: 24 * 60 * 60,
        }
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Token(format!("failed to generate token: {e}")))
    }
}

impl AuthService for JwtAuth {
    fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = unix_now()?;
        self.encode_claims(&Claims {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            iat: now,
            exp: now + self.expiry_seconds,
        })
    }

    fn verify(&self, credential: &str) -> Result<AuthenticatedUser, AuthError> {
        let token = credential
            .trim()
            .strip_prefix("Bearer ")
            .unwrap_or(credential.trim());
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken,
        })?;

        Ok(AuthenticatedUser {
            user_id: data.claims.user_id,
            email: data.claims.email,
            username: data.claims.username,
        })
    }
}

fn unix_now() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AuthError::Token(format!("system time error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::Progression;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: UserId(7),
            email: "seeker@example.com".to_string(),
            username: "seeker".to_string(),
            name: "Seeker".to_string(),
            password_hash: String::new(),
            spiritual_level: "Beginner".to_string(),
            contemplation_streak: 0,
            progression: Progression::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let auth = JwtAuth::new_dev();
        let token = auth.issue(&user()).unwrap();
        let who = auth.verify(&token).unwrap();
        assert_eq!(who.user_id, UserId(7));
        assert_eq!(who.username, "seeker");

        let header = format!("Bearer {token}");
        assert_eq!(auth.verify(&header).unwrap().user_id, UserId(7));
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = JwtAuth::new_dev().issue(&user()).unwrap();
        let other = JwtAuth::new("x".repeat(40), 60).unwrap();
        assert_eq!(other.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_tokens_are_reported() {
        let auth = JwtAuth::new_dev();
        let now = unix_now().unwrap();
        let token = auth
            .encode_claims(&Claims {
                user_id: UserId(7),
                email: "seeker@example.com".to_string(),
                username: "seeker".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert_eq!(auth.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn empty_credential_is_missing() {
        assert_eq!(JwtAuth::new_dev().verify("  "), Err(AuthError::MissingToken));
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(JwtAuth::new("short".to_string(), 60).is_err());
    }
}
