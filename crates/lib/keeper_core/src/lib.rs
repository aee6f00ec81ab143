//! # keeper_core
//!
//! Core domain logic for Keeper: token codec, session bindings, vault
//! models, the RPC wire contract, and vault storage.

pub mod auth;
pub mod ids;
pub mod migrate;
pub mod models;
pub mod rpc;
pub mod vault;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
