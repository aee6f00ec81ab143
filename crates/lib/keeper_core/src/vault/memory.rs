//! In-memory vault repository (development mode and tests).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{VaultError, VaultRepository, page_offset, validate_draft};
use crate::models::auth::{User, UserWithPassword};
use crate::models::item::{ItemDraft, ItemSummary, MetaEntry, StoredItem};
use crate::ids::{new_item_id, new_user_id};

struct MemoryItem {
    user_id: String,
    item: StoredItem,
    metadata: Vec<MetaEntry>,
}

#[derive(Default)]
struct MemoryState {
    /// Keyed by login.
    users: HashMap<String, UserWithPassword>,
    /// Keyed by UUIDv7 string, so iteration order is creation order.
    items: BTreeMap<String, MemoryItem>,
}

/// Vault repository held entirely in process memory.
#[derive(Default)]
pub struct MemoryVaultRepository {
    state: RwLock<MemoryState>,
}

impl MemoryVaultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultRepository for MemoryVaultRepository {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, VaultError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(login) {
            return Err(VaultError::AlreadyExists(format!("login '{login}' is taken")));
        }
        let user = User {
            id: new_user_id().to_string(),
            login: login.to_string(),
        };
        state.users.insert(
            login.to_string(),
            UserWithPassword {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(user)
    }

    async fn find_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserWithPassword>, VaultError> {
        Ok(self.state.read().await.users.get(login).cloned())
    }

    async fn list_items(
        &self,
        user_id: &str,
        page: i32,
        page_size: i32,
    ) -> Result<Vec<ItemSummary>, VaultError> {
        let offset = usize::try_from(page_offset(page, page_size)?)
            .map_err(|e| VaultError::InvalidArgument(e.to_string()))?;
        let state = self.state.read().await;
        Ok(state
            .items
            .values()
            .filter(|m| m.user_id == user_id)
            .skip(offset)
            .take(page_size as usize)
            .map(|m| m.item.summary.clone())
            .collect())
    }

    async fn get_item(&self, user_id: &str, item_id: &str) -> Result<StoredItem, VaultError> {
        let state = self.state.read().await;
        state
            .items
            .get(item_id)
            .filter(|m| m.user_id == user_id)
            .map(|m| m.item.clone())
            .ok_or_else(|| VaultError::NotFound(format!("item {item_id}")))
    }

    async fn item_metadata(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Vec<MetaEntry>, VaultError> {
        let state = self.state.read().await;
        let mut entries = state
            .items
            .get(item_id)
            .filter(|m| m.user_id == user_id)
            .map(|m| m.metadata.clone())
            .ok_or_else(|| VaultError::NotFound(format!("item {item_id}")))?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn put_item(&self, user_id: &str, draft: ItemDraft) -> Result<ItemSummary, VaultError> {
        validate_draft(&draft)?;
        let mut state = self.state.write().await;

        let id = match draft.id {
            Some(id) => {
                let owned = state.items.get(&id).is_some_and(|m| m.user_id == user_id);
                if !owned {
                    return Err(VaultError::NotFound(format!("item {id}")));
                }
                id
            }
            None => new_item_id().to_string(),
        };

        let summary = ItemSummary {
            id: id.clone(),
            kind: draft.payload.kind(),
            name: draft.name,
            updated_at: Utc::now(),
        };
        state.items.insert(
            id,
            MemoryItem {
                user_id: user_id.to_string(),
                item: StoredItem {
                    summary: summary.clone(),
                    payload: draft.payload,
                },
                metadata: draft.metadata,
            },
        );
        Ok(summary)
    }
}
