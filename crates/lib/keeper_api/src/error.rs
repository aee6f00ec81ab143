//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keeper_core::auth::{AuthError, TokenError};
use keeper_core::rpc::{RpcCode, RpcStatus};
use keeper_core::vault::VaultError;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with RPC status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> RpcCode {
        match self {
            AppError::InvalidArgument(_) => RpcCode::InvalidArgument,
            AppError::NotFound(_) => RpcCode::NotFound,
            AppError::AlreadyExists(_) => RpcCode::AlreadyExists,
            AppError::Unauthenticated(_) => RpcCode::Unauthenticated,
            AppError::Unavailable(_) => RpcCode::Unavailable,
            AppError::Internal(_) => RpcCode::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidArgument(m) => (StatusCode::BAD_REQUEST, m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.as_str()),
            AppError::AlreadyExists(m) => (StatusCode::CONFLICT, m.as_str()),
            AppError::Unauthenticated(m) => (StatusCode::UNAUTHORIZED, m.as_str()),
            AppError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.as_str()),
            AppError::Internal(m) => {
                tracing::error!(error = %m, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        let body = Json(RpcStatus {
            code: self.code(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<VaultError> for AppError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::NotFound(m) => AppError::NotFound(m),
            VaultError::AlreadyExists(m) => AppError::AlreadyExists(m),
            VaultError::InvalidArgument(m) => AppError::InvalidArgument(m),
            VaultError::DbError(e) => AppError::Internal(e.to_string()),
            VaultError::Internal(m) => AppError::Internal(m),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthenticated("invalid credentials".into()),
            AuthError::Internal(m) => AppError::Internal(m),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(m) => AppError::Internal(m),
            TokenError::Expired | TokenError::Malformed(_) => {
                AppError::Unauthenticated("invalid token".into())
            }
        }
    }
}
