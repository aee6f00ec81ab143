//! PostgreSQL vault repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{VaultError, VaultRepository, page_offset, validate_draft};
use crate::models::auth::{User, UserWithPassword};
use crate::models::item::{ItemDraft, ItemKind, ItemPayload, ItemSummary, MetaEntry, StoredItem};
use crate::ids::{new_item_id, parse_id as parse_uuid};

/// Vault repository over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgVaultRepository {
    pool: PgPool,
}

impl PgVaultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Parse an ID; malformed IDs cannot exist, so they are "not found".
fn parse_id(id: &str, what: &str) -> Result<Uuid, VaultError> {
    parse_uuid(id).ok_or_else(|| VaultError::NotFound(format!("{what} {id}")))
}

fn parse_kind(kind: &str) -> Result<ItemKind, VaultError> {
    kind.parse().map_err(VaultError::Internal)
}

type SummaryRow = (String, String, String, DateTime<Utc>);

fn summary_from_row((id, kind, name, updated_at): SummaryRow) -> Result<ItemSummary, VaultError> {
    Ok(ItemSummary {
        id,
        kind: parse_kind(&kind)?,
        name,
        updated_at,
    })
}

#[async_trait]
impl VaultRepository for PgVaultRepository {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, VaultError> {
        let result = sqlx::query_scalar::<_, String>(
            "INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING id::text",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(User {
                id,
                login: login.to_string(),
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                VaultError::AlreadyExists(format!("login '{login}' is taken")),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserWithPassword>, VaultError> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id::text, login, password_hash FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, login, password_hash)| UserWithPassword {
            user: User { id, login },
            password_hash,
        }))
    }

    async fn list_items(
        &self,
        user_id: &str,
        page: i32,
        page_size: i32,
    ) -> Result<Vec<ItemSummary>, VaultError> {
        let offset = page_offset(page, page_size)?;
        let user = parse_id(user_id, "user")?;
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT id::text, kind, name, updated_at FROM items \
             WHERE user_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(user)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(summary_from_row).collect()
    }

    async fn get_item(&self, user_id: &str, item_id: &str) -> Result<StoredItem, VaultError> {
        let user = parse_id(user_id, "user")?;
        let item = parse_id(item_id, "item")?;
        let row = sqlx::query_as::<_, (String, String, String, DateTime<Utc>, Json<ItemPayload>)>(
            "SELECT id::text, kind, name, updated_at, payload FROM items \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(item)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("item {item_id}")))?;

        let (id, kind, name, updated_at, Json(payload)) = row;
        Ok(StoredItem {
            summary: summary_from_row((id, kind, name, updated_at))?,
            payload,
        })
    }

    async fn item_metadata(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Vec<MetaEntry>, VaultError> {
        let user = parse_id(user_id, "user")?;
        let item = parse_id(item_id, "item")?;
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND user_id = $2)",
        )
        .bind(item)
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        if !owned {
            return Err(VaultError::NotFound(format!("item {item_id}")));
        }

        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM item_metadata WHERE item_id = $1 ORDER BY key",
        )
        .bind(item)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| MetaEntry { key, value })
            .collect())
    }

    async fn put_item(&self, user_id: &str, draft: ItemDraft) -> Result<ItemSummary, VaultError> {
        validate_draft(&draft)?;
        let user = parse_id(user_id, "user")?;
        let kind = draft.payload.kind();
        let mut tx = self.pool.begin().await?;

        let row = match draft.id.as_deref() {
            Some(existing) => {
                let item = parse_id(existing, "item")?;
                sqlx::query_as::<_, SummaryRow>(
                    "UPDATE items SET kind = $1, name = $2, payload = $3, updated_at = now() \
                     WHERE id = $4 AND user_id = $5 \
                     RETURNING id::text, kind, name, updated_at",
                )
                .bind(kind.as_str())
                .bind(&draft.name)
                .bind(Json(&draft.payload))
                .bind(item)
                .bind(user)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| VaultError::NotFound(format!("item {existing}")))?
            }
            None => {
                sqlx::query_as::<_, SummaryRow>(
                    "INSERT INTO items (id, user_id, kind, name, payload) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING id::text, kind, name, updated_at",
                )
                .bind(new_item_id())
                .bind(user)
                .bind(kind.as_str())
                .bind(&draft.name)
                .bind(Json(&draft.payload))
                .fetch_one(&mut *tx)
                .await?
            }
        };
        let summary = summary_from_row(row)?;
        let item = parse_id(&summary.id, "item")?;

        sqlx::query("DELETE FROM item_metadata WHERE item_id = $1")
            .bind(item)
            .execute(&mut *tx)
            .await?;
        for entry in &draft.metadata {
            sqlx::query("INSERT INTO item_metadata (item_id, key, value) VALUES ($1, $2, $3)")
                .bind(item)
                .bind(&entry.key)
                .bind(&entry.value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(summary)
    }
}
