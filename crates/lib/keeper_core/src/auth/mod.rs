//! Authentication primitives.
//!
//! Provides the bearer-token codec, the session store that binds live tokens
//! to users, and password hashing. Shared by `keeper_api` and its tests.

pub mod jwt;
pub mod password;
pub mod session;

use thiserror::Error;

pub use jwt::{IssuedToken, TokenCodec, TokenError, TokenKind};
pub use session::{MemorySessionStore, RedisSessionStore, SessionError, SessionStore};

/// Password hashing errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Internal error: {0}")]
    Internal(String),
}
