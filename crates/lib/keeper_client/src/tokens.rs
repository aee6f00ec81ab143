//! Local token lifecycle.
//!
//! [`TokenManager`] holds the current access/refresh pair in memory and
//! mirrors it to a [`TokenStorage`]. Readers always see both tokens from the
//! same update.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use keeper_core::models::auth::TokenPair;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// File name of the persisted token pair inside the data directory.
pub const TOKENS_FILE: &str = "tokens.json";

/// Durable home for the token pair.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, ClientError>;
    fn save(&self, pair: &TokenPair) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// Stores the token pair as JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `tokens.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(TOKENS_FILE))
    }

    /// Platform data directory, e.g. `~/.local/share/keeper` on Linux.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keeper")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<TokenPair>, ClientError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, pair: &TokenPair) -> Result<(), ClientError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        // Write-then-rename so a crash never leaves half a pair on disk.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(pair)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

type AuthFailureHook = Arc<dyn Fn() + Send + Sync>;

/// Holds the client's current token pair.
pub struct TokenManager {
    storage: Box<dyn TokenStorage>,
    tokens: RwLock<Option<TokenPair>>,
    on_auth_failure: RwLock<Option<AuthFailureHook>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("authorized", &self.is_authorized())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Empty manager backed by `storage`. Call [`load_tokens`](Self::load_tokens)
    /// to pick up a persisted pair.
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self {
            storage,
            tokens: RwLock::new(None),
            on_auth_failure: RwLock::new(None),
        }
    }

    /// Restore the persisted pair, if any. Returns whether one was found.
    pub fn load_tokens(&self) -> Result<bool, ClientError> {
        let loaded = self.storage.load()?;
        let found = loaded.is_some();
        *self.write() = loaded;
        debug!(found, "loaded persisted tokens");
        Ok(found)
    }

    /// Replace both tokens. Persisted first; on storage failure the
    /// in-memory pair is left untouched.
    pub fn update_tokens(&self, access: &str, refresh: &str) -> Result<(), ClientError> {
        let pair = TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        };
        self.storage.save(&pair)?;
        *self.write() = Some(pair);
        Ok(())
    }

    /// Drop both tokens without signalling an authentication failure.
    pub fn clear_tokens(&self) -> Result<(), ClientError> {
        *self.write() = None;
        self.storage.clear()
    }

    /// True iff an access token is held.
    pub fn is_authorized(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|pair| !pair.access_token.is_empty())
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|pair| pair.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().map(|pair| pair.refresh_token.clone())
    }

    /// Register the hook run by [`handle_auth_failure`](Self::handle_auth_failure).
    pub fn set_on_auth_failure<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self
            .on_auth_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// The server rejected our credentials: forget the tokens and notify.
    pub fn handle_auth_failure(&self) {
        info!("authentication rejected by server, clearing tokens");
        *self.write() = None;
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to remove persisted tokens");
        }
        let hook = self
            .on_auth_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<TokenPair>> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<TokenPair>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory storage for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryTokenStorage {
    pair: std::sync::Mutex<Option<TokenPair>>,
    pub(crate) fail_saves: bool,
}

#[cfg(test)]
impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<TokenPair>, ClientError> {
        Ok(self.pair.lock().unwrap().clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<(), ClientError> {
        if self.fail_saves {
            return Err(std::io::Error::other("disk full").into());
        }
        *self.pair.lock().unwrap() = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.pair.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn memory_manager() -> TokenManager {
        TokenManager::new(Box::new(MemoryTokenStorage::default()))
    }

    #[test]
    fn fresh_manager_is_not_authorized() {
        let tokens = memory_manager();
        assert!(!tokens.is_authorized());
        assert_eq!(tokens.access_token(), None);
        assert_eq!(tokens.refresh_token(), None);
    }

    #[test]
    fn update_sets_both_tokens() {
        let tokens = memory_manager();
        tokens.update_tokens("a1", "r1").unwrap();
        assert!(tokens.is_authorized());
        assert_eq!(tokens.access_token().as_deref(), Some("a1"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("r1"));

        tokens.update_tokens("a2", "r2").unwrap();
        assert_eq!(tokens.access_token().as_deref(), Some("a2"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("r2"));
    }

    #[test]
    fn failed_save_keeps_previous_pair() {
        let storage = MemoryTokenStorage {
            fail_saves: true,
            ..Default::default()
        };
        let tokens = TokenManager::new(Box::new(storage));
        assert!(tokens.update_tokens("a1", "r1").is_err());
        assert!(!tokens.is_authorized());
    }

    #[test]
    fn auth_failure_clears_tokens_and_runs_hook() {
        let tokens = memory_manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        tokens.set_on_auth_failure(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        tokens.update_tokens("a1", "r1").unwrap();

        tokens.handle_auth_failure();

        assert!(!tokens.is_authorized());
        assert_eq!(tokens.refresh_token(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn auth_failure_without_hook_is_fine() {
        let tokens = memory_manager();
        tokens.update_tokens("a1", "r1").unwrap();
        tokens.handle_auth_failure();
        assert!(!tokens.is_authorized());
    }

    #[test]
    fn file_storage_round_trips_across_managers() {
        let dir = tempfile::tempdir().unwrap();
        let first = TokenManager::new(Box::new(FileTokenStorage::in_dir(dir.path())));
        assert!(!first.load_tokens().unwrap());
        first.update_tokens("a1", "r1").unwrap();
        assert!(dir.path().join(TOKENS_FILE).exists());

        let second = TokenManager::new(Box::new(FileTokenStorage::in_dir(dir.path())));
        assert!(second.load_tokens().unwrap());
        assert_eq!(second.access_token().as_deref(), Some("a1"));
        assert_eq!(second.refresh_token().as_deref(), Some("r1"));
    }

    #[test]
    fn file_storage_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::in_dir(dir.path().join("nested").join("deeper"));
        storage
            .save(&TokenPair {
                access_token: "a".into(),
                refresh_token: "r".into(),
            })
            .unwrap();
        assert!(storage.path().exists());
    }

    #[test]
    fn auth_failure_removes_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = TokenManager::new(Box::new(FileTokenStorage::in_dir(dir.path())));
        tokens.update_tokens("a1", "r1").unwrap();
        tokens.handle_auth_failure();
        assert!(!dir.path().join(TOKENS_FILE).exists());
    }

    #[test]
    fn clearing_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::in_dir(dir.path());
        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
