//! Vault storage: users and their items.
//!
//! [`VaultRepository`] is the seam between RPC handlers and persistence.
//! `postgres` is the production backend; `memory` backs development mode and
//! tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::{User, UserWithPassword};
use crate::models::item::{ItemDraft, ItemSummary, MetaEntry, StoredItem};
use crate::rpc::MAX_PAGE_SIZE;

pub use memory::MemoryVaultRepository;
pub use postgres::PgVaultRepository;

/// Vault storage errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Persistence for users and vault items.
///
/// Every item operation is scoped to `user_id`; items owned by someone else
/// are reported as not found.
#[async_trait]
pub trait VaultRepository: Send + Sync {
    /// Create a user; fails with `AlreadyExists` on a duplicate login.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, VaultError>;

    async fn find_user_by_login(&self, login: &str)
    -> Result<Option<UserWithPassword>, VaultError>;

    /// One page of the user's items, ordered by ID. `page` is 1-based.
    async fn list_items(
        &self,
        user_id: &str,
        page: i32,
        page_size: i32,
    ) -> Result<Vec<ItemSummary>, VaultError>;

    async fn get_item(&self, user_id: &str, item_id: &str) -> Result<StoredItem, VaultError>;

    async fn item_metadata(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Vec<MetaEntry>, VaultError>;

    /// Create or replace an item together with its whole metadata set.
    async fn put_item(&self, user_id: &str, draft: ItemDraft) -> Result<ItemSummary, VaultError>;
}

/// Validate paging arguments and return the row offset.
pub fn page_offset(page: i32, page_size: i32) -> Result<i64, VaultError> {
    if page < 1 {
        return Err(VaultError::InvalidArgument(format!(
            "page must be >= 1, got {page}"
        )));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(VaultError::InvalidArgument(format!(
            "page_size must be within 1..={MAX_PAGE_SIZE}, got {page_size}"
        )));
    }
    Ok(i64::from(page - 1) * i64::from(page_size))
}

/// Reject drafts with no name or duplicate metadata keys.
pub fn validate_draft(draft: &ItemDraft) -> Result<(), VaultError> {
    if draft.name.trim().is_empty() {
        return Err(VaultError::InvalidArgument("item name is required".into()));
    }
    let mut keys: Vec<&str> = draft.metadata.iter().map(|m| m.key.as_str()).collect();
    keys.sort_unstable();
    if keys.windows(2).any(|w| w[0] == w[1]) {
        return Err(VaultError::InvalidArgument(
            "duplicate metadata key".into(),
        ));
    }
    if keys.iter().any(|k| k.is_empty()) {
        return Err(VaultError::InvalidArgument("empty metadata key".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{ItemPayload, Note};

    fn draft(name: &str, meta: &[(&str, &str)]) -> ItemDraft {
        ItemDraft {
            id: None,
            name: name.into(),
            payload: ItemPayload::Note(Note { text: "t".into() }),
            metadata: meta.iter().map(|(k, v)| MetaEntry::new(*k, *v)).collect(),
        }
    }

    #[test]
    fn page_offset_is_zero_based() {
        assert_eq!(page_offset(1, 10).unwrap(), 0);
        assert_eq!(page_offset(3, 10).unwrap(), 20);
    }

    #[test]
    fn page_offset_rejects_bad_arguments() {
        assert!(matches!(page_offset(0, 10), Err(VaultError::InvalidArgument(_))));
        assert!(matches!(page_offset(1, 0), Err(VaultError::InvalidArgument(_))));
        assert!(matches!(
            page_offset(1, MAX_PAGE_SIZE + 1),
            Err(VaultError::InvalidArgument(_))
        ));
    }

    #[test]
    fn draft_validation() {
        assert!(validate_draft(&draft("n", &[("a", "1"), ("b", "2")])).is_ok());
        assert!(validate_draft(&draft(" ", &[])).is_err());
        assert!(validate_draft(&draft("n", &[("a", "1"), ("a", "2")])).is_err());
        assert!(validate_draft(&draft("n", &[("", "1")])).is_err());
    }
}
