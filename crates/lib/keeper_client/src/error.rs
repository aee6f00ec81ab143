//! Client error types.

use keeper_core::rpc::RpcCode;
use thiserror::Error;

/// Errors from RPC calls and local token storage.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the call's credentials. Never retried.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("RPC failed ({code}): {message}")]
    Rpc { code: RpcCode, message: String },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ClientError::Unauthenticated(_))
    }
}

/// Errors from a synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No access token is held; the pass was aborted before any network call.
    #[error("Not authorized, sync aborted")]
    Unauthorized,

    /// Listing failed, or the server rejected the session mid-pass.
    #[error("Sync failed: {0}")]
    Rpc(#[from] ClientError),
}
