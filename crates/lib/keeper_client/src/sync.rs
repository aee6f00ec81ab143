//! Pull-based replication of the remote vault into a [`LocalVault`].
//!
//! A pass lists every remote item page by page, then fetches the metadata
//! and typed payload of each item changed since the last pass that stored
//! anything. At most one pass runs at a time per engine; a trigger that
//! arrives while a pass is running returns [`SyncOutcome::Skipped`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::Utc;
use keeper_core::models::item::{ItemKind, ItemSummary};
use keeper_core::rpc::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CachedItem, LocalItem, LocalVault};
use crate::error::{ClientError, SyncError};
use crate::rpc::VaultRpc;
use crate::tokens::TokenManager;

/// Interval between background passes unless configured otherwise.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

/// Counters for one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Summaries returned by the server.
    pub listed: usize,
    /// Items fetched and stored.
    pub updated: usize,
    /// Items older than the watermark.
    pub unchanged: usize,
    /// Items whose fetch failed; retried next pass.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was already running.
    Skipped,
}

/// Marks the engine busy; released on drop, including on panic.
struct SyncGuard<'a>(&'a AtomicU8);

impl<'a> SyncGuard<'a> {
    fn acquire(state: &'a AtomicU8) -> Option<Self> {
        state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(state))
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

pub struct SyncEngine {
    rpc: Arc<dyn VaultRpc>,
    tokens: Arc<TokenManager>,
    vault: Mutex<LocalVault>,
    state: AtomicU8,
    page_size: i32,
}

impl SyncEngine {
    pub fn new(rpc: Arc<dyn VaultRpc>, tokens: Arc<TokenManager>) -> Self {
        Self {
            rpc,
            tokens,
            vault: Mutex::new(LocalVault::default()),
            state: AtomicU8::new(IDLE),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the listing page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// The local caches. Hold the lock briefly; a running pass needs it to store.
    pub fn vault(&self) -> &Mutex<LocalVault> {
        &self.vault
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Run one synchronization pass.
    pub async fn sync_items(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_guard) = SyncGuard::acquire(&self.state) else {
            debug!("sync already running, skipping");
            return Ok(SyncOutcome::Skipped);
        };
        if !self.tokens.is_authorized() {
            debug!("no access token, sync aborted");
            return Err(SyncError::Unauthorized);
        }

        let summaries = self.list_all().await?;
        let mut report = SyncReport {
            listed: summaries.len(),
            ..SyncReport::default()
        };

        for summary in &summaries {
            if !self.vault.lock().await.is_stale(summary.updated_at) {
                report.unchanged += 1;
                continue;
            }
            match self.fetch_item(summary).await {
                Ok(item) => {
                    self.vault.lock().await.store(item);
                    report.updated += 1;
                }
                // The session is gone; every remaining fetch would be rejected too.
                Err(e @ ClientError::Unauthenticated(_)) => {
                    warn!(
                        item_id = %summary.id,
                        updated = report.updated,
                        "session rejected mid-pass, sync aborted"
                    );
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(item_id = %summary.id, kind = %summary.kind, error = %e, "failed to sync item");
                    report.failed += 1;
                }
            }
        }

        if report.updated > 0 {
            self.vault.lock().await.set_watermark(Utc::now());
        }
        info!(
            listed = report.listed,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "sync pass complete"
        );
        Ok(SyncOutcome::Completed(report))
    }

    /// Drain every page. A page shorter than the page size is the last one.
    async fn list_all(&self) -> Result<Vec<ItemSummary>, ClientError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let resp = self.rpc.list_items(page, self.page_size).await?;
            let count = resp.count;
            items.extend(resp.items);
            if count < self.page_size {
                break;
            }
            page += 1;
        }
        info!(total = items.len(), pages = page, "listed remote items");
        Ok(items)
    }

    async fn fetch_item(&self, summary: &ItemSummary) -> Result<LocalItem, ClientError> {
        let id = summary.id.as_str();
        let metadata = self.rpc.item_metadata(id).await?;
        let item = match summary.kind {
            ItemKind::Credential => LocalItem::Credential(CachedItem::from_response(
                self.rpc.get_credential(id).await?,
                metadata,
            )),
            ItemKind::Note => {
                LocalItem::Note(CachedItem::from_response(self.rpc.get_note(id).await?, metadata))
            }
            ItemKind::Card => {
                LocalItem::Card(CachedItem::from_response(self.rpc.get_card(id).await?, metadata))
            }
            ItemKind::Binary => LocalItem::Binary(CachedItem::from_response(
                self.rpc.get_binary(id).await?,
                metadata,
            )),
        };
        Ok(item)
    }

    /// Run a pass every `every` until `cancel` fires. The first pass starts
    /// immediately.
    pub fn spawn_background(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match engine.sync_items().await {
                    Ok(SyncOutcome::Completed(_)) | Ok(SyncOutcome::Skipped) => {}
                    Err(SyncError::Unauthorized) => debug!("background sync idle, not logged in"),
                    Err(e) => warn!(error = %e, "background sync failed"),
                }
            }
            debug!("background sync stopped");
        })
    }
}
