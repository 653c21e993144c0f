//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs signed with `BANGLE_JWT_SECRET`. A token names the
//! kind of account it was issued to, so a customer token can never pass an
//! admin check even when the numeric ids collide.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bangle_core::{AdminId, AdminRole, CustomerId};

use crate::config::AuthConfig;
use crate::models::{Admin, Customer};

/// Errors from minting or verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("failed to encode token: {0}")]
    Encode(String),
}

/// Which kind of account a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Customer,
    Admin,
}

/// Claims carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id within its kind.
    pub sub: i32,
    pub email: String,
    pub kind: AccountKind,
    /// Admin role at issue time. Absent for customers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl Claims {
    /// The customer id, if this is a customer token.
    #[must_use]
    pub fn customer_id(&self) -> Option<CustomerId> {
        (self.kind == AccountKind::Customer).then(|| CustomerId::new(self.sub))
    }

    /// The admin id and role, if this is an admin token.
    #[must_use]
    pub fn admin(&self) -> Option<(AdminId, AdminRole)> {
        match (self.kind, self.role) {
            (AccountKind::Admin, Some(role)) => Some((AdminId::new(self.sub), role)),
            _ => None,
        }
    }
}

/// Signs and verifies tokens with a shared secret.
pub struct TokenService<'a> {
    config: &'a AuthConfig,
}

impl<'a> TokenService<'a> {
    /// Create a token service.
    #[must_use]
    pub const fn new(config: &'a AuthConfig) -> Self {
        Self { config }
    }

    /// Issue a token for a customer.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_customer(&self, customer: &Customer, now: SystemTime) -> Result<String, TokenError> {
        self.mint(
            customer.id.as_i32(),
            customer.email.as_str(),
            AccountKind::Customer,
            None,
            now,
        )
    }

    /// Issue a token for an admin.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_admin(&self, admin: &Admin, now: SystemTime) -> Result<String, TokenError> {
        self.mint(
            admin.id.as_i32(),
            admin.email.as_str(),
            AccountKind::Admin,
            Some(admin.role),
            now,
        )
    }

    fn mint(
        &self,
        sub: i32,
        email: &str,
        kind: AccountKind,
        role: Option<AdminRole>,
        now: SystemTime,
    ) -> Result<String, TokenError> {
        let iat = unix_seconds(now)?;
        let ttl = i64::try_from(self.config.token_ttl.as_secs())
            .map_err(|_| TokenError::Encode("token lifetime out of range".to_owned()))?;

        let claims = Claims {
            sub,
            email: email.to_owned(),
            kind,
            role,
            iat,
            exp: iat.saturating_add(ttl),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verify a token's signature and expiry and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for an expired token and
    /// `TokenError::Invalid` for anything else that fails to verify.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => {
                tracing::debug!("token signature mismatch");
                TokenError::Invalid
            }
            _ => TokenError::Invalid,
        })
    }

    /// Token lifetime, reported to clients alongside the token.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.config.token_ttl
    }
}

fn unix_seconds(now: SystemTime) -> Result<i64, TokenError> {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::Encode("system clock before unix epoch".to_owned()))?
        .as_secs();
    i64::try_from(secs).map_err(|_| TokenError::Encode("timestamp out of range".to_owned()))
}
