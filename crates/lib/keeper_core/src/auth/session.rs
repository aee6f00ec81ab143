//! Session bindings: live bearer token → user identity.
//!
//! A token is only honoured while a binding for it exists. Bindings expire
//! with the token they describe; [`SessionStore::revoke`] drops one early.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tracing::debug;

/// Cleanup cadence for the in-memory store.
const MEMORY_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Session store errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No binding: the session was revoked, expired, or never existed.
    #[error("Session not found")]
    NotFound,

    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(e: redis::RedisError) -> Self {
        SessionError::Unavailable(e.to_string())
    }
}

/// Key/value cache holding session bindings.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create or overwrite the binding for `token`.
    async fn put(&self, token: &str, subject: &str, ttl: Duration) -> Result<(), SessionError>;

    /// Resolve the user bound to `token`.
    async fn get(&self, token: &str) -> Result<String, SessionError>;

    /// Drop the binding for `token`, if any.
    async fn revoke(&self, token: &str) -> Result<(), SessionError>;
}

// =============================================================================
// Redis
// =============================================================================

/// Redis-backed store. Keys are raw tokens; values are user IDs.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    /// Connect to the Redis instance at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, token: &str, subject: &str, ttl: Duration) -> Result<(), SessionError> {
        let secs = ttl.as_secs();
        if secs == 0 {
            debug!("session ttl elapsed before write, skipping");
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(token, subject, secs).await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<String, SessionError> {
        let mut conn = self.conn.clone();
        let subject: Option<String> = conn.get(token).await?;
        subject.ok_or(SessionError::NotFound)
    }

    async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(token).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

struct Binding {
    subject: String,
    expires_at: Instant,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    bindings: DashMap<String, Binding>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bindings currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Evict expired bindings.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.bindings.retain(|_, b| b.expires_at > now);
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MEMORY_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, token: &str, subject: &str, ttl: Duration) -> Result<(), SessionError> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.bindings.insert(
            token.to_string(),
            Binding {
                subject: subject.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<String, SessionError> {
        let binding = self.bindings.get(token).ok_or(SessionError::NotFound)?;
        if binding.expires_at <= Instant::now() {
            drop(binding);
            self.bindings.remove(token);
            return Err(SessionError::NotFound);
        }
        Ok(binding.subject.clone())
    }

    async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        self.bindings.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemorySessionStore::new();
        store
            .put("tok", "user-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("tok").await.unwrap(), "user-1");
    }

    #[tokio::test]
    async fn missing_binding_is_not_found() {
        let store = MemorySessionStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn put_overwrites_existing_binding() {
        let store = MemorySessionStore::new();
        store.put("tok", "user-1", Duration::from_secs(60)).await.unwrap();
        store.put("tok", "user-2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("tok").await.unwrap(), "user-2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_binding_is_not_found() {
        let store = MemorySessionStore::new();
        store
            .put("tok", "user-1", Duration::from_millis(10))
            .await
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(store.get("tok").await, Err(SessionError::NotFound)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_writes_nothing() {
        let store = MemorySessionStore::new();
        store.put("tok", "user-1", Duration::ZERO).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn revoke_drops_binding() {
        let store = MemorySessionStore::new();
        store.put("tok", "user-1", Duration::from_secs(60)).await.unwrap();
        store.revoke("tok").await.unwrap();
        assert!(matches!(store.get("tok").await, Err(SessionError::NotFound)));
        // Revoking twice is fine.
        store.revoke("tok").await.unwrap();
    }

    #[test]
    fn cleanup_evicts_only_expired() {
        let store = MemorySessionStore::new();
        store.bindings.insert(
            "old".into(),
            Binding {
                subject: "u".into(),
                expires_at: Instant::now(),
            },
        );
        store.bindings.insert(
            "new".into(),
            Binding {
                subject: "u".into(),
                expires_at: Instant::now() + Duration::from_secs(60),
            },
        );
        store.cleanup();
        assert_eq!(store.len(), 1);
        assert!(store.bindings.contains_key("new"));
    }
}
