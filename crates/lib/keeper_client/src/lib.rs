//! # keeper_client
//!
//! Client side of Keeper: the local token lifecycle, a typed RPC client, and
//! the synchronization engine that replicates the remote vault into typed
//! local caches.

pub mod auth;
pub mod cache;
pub mod error;
pub mod rpc;
pub mod sync;
pub mod tokens;

pub use auth::{Authenticator, DEFAULT_REFRESH_INTERVAL};
pub use cache::{CachedItem, LocalItem, LocalVault};
pub use error::{ClientError, SyncError};
pub use rpc::{HttpVaultClient, VaultRpc};
pub use sync::{SyncEngine, SyncOutcome, SyncReport};
pub use tokens::{FileTokenStorage, TokenManager, TokenStorage};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
