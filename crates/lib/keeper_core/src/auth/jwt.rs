//! Bearer token issuance and validation.
//!
//! Tokens are HS256 JWTs. The signing secret is owned by a [`TokenCodec`]
//! built once from configuration and shared by reference; nothing here reads
//! process-wide state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::info;

pub use crate::models::auth::{TokenClaims, TokenKind};

/// Token codec errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Token expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// A freshly signed token together with its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Lifetime left at `now`, clamped to zero.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }

    /// Lifetime left right now.
    pub fn remaining(&self) -> std::time::Duration {
        self.remaining_at(Utc::now())
    }
}

/// Issues and validates signed, time-limited bearer tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    usable: bool,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("usable", &self.usable)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec around an HMAC secret.
    ///
    /// An empty secret yields a codec that refuses to sign.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            usable: !secret.is_empty(),
        }
    }

    /// Sign a token for `subject` valid for `ttl` from now.
    pub fn issue(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, kind, ttl, Utc::now())
    }

    /// Sign a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if !self.usable {
            return Err(TokenError::Signing("empty signing key".into()));
        }
        let expires_at = now + ttl;
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            kind,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(format!("jwt encode: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Validate `token` as a `kind` token against the wall clock.
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        self.validate_at(token, kind, Utc::now())
    }

    /// Validate `token` as if the current time were `now`.
    ///
    /// Expiry is strict: a token is dead at `now >= exp`.
    pub fn validate_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock, without leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed("empty subject".into()));
        }
        if claims.kind != kind {
            return Err(TokenError::Malformed(format!(
                "expected {kind} token, got {}",
                claims.kind
            )));
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keeper")
        .join("jwt-secret")
}
