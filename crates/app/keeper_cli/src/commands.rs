use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use keeper_client::{
    Authenticator, FileTokenStorage, HttpVaultClient, LocalVault, SyncEngine, SyncOutcome,
    TokenManager, VaultRpc,
};
use keeper_core::models::item::{
    BinaryInfo, Card, Credential, ItemDraft, ItemKind, ItemPayload, Note,
};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::cli::{AddArgs, AddItem, Cli};
use crate::{Error, Result};

/// Client pieces wired against one data directory and server.
pub struct Context {
    pub data_dir: PathBuf,
    pub server_url: String,
    pub tokens: Arc<TokenManager>,
    pub rpc: Arc<HttpVaultClient>,
}

impl Context {
    pub fn open(cli: &Cli) -> Result<Self> {
        let data_dir = cli
            .data_dir
            .clone()
            .unwrap_or_else(FileTokenStorage::default_dir);
        let tokens = Arc::new(TokenManager::new(Box::new(FileTokenStorage::in_dir(
            &data_dir,
        ))));
        tokens.load_tokens()?;
        let rpc = Arc::new(HttpVaultClient::new(&cli.server_url, Arc::clone(&tokens))?);
        Ok(Self {
            data_dir,
            server_url: cli.server_url.clone(),
            tokens,
            rpc,
        })
    }

    fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.rpc.clone(), Arc::clone(&self.tokens))
    }

    fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.rpc.clone(), Arc::clone(&self.tokens))
    }
}

pub async fn register(ctx: &Context, login: &str, password: &str) -> Result<()> {
    ctx.authenticator().register(login, password).await?;
    println!("registered and logged in as {login}");
    Ok(())
}

pub async fn login(ctx: &Context, login: &str, password: &str) -> Result<()> {
    ctx.authenticator().login(login, password).await?;
    println!("logged in as {login}");
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    ctx.authenticator().logout().await?;
    println!("logged out");
    Ok(())
}

pub async fn refresh(ctx: &Context) -> Result<()> {
    ctx.authenticator().refresh().await?;
    println!("tokens refreshed");
    Ok(())
}

pub fn status(ctx: &Context) {
    let state = if ctx.tokens.is_authorized() {
        "logged in"
    } else {
        "not logged in"
    };
    println!("{state}");
    println!("server:   {}", ctx.server_url);
    println!("data dir: {}", ctx.data_dir.display());
}

pub async fn sync(ctx: &Context) -> Result<()> {
    let engine = ctx.engine();
    match engine.sync_items().await? {
        SyncOutcome::Completed(report) => println!(
            "listed {}, updated {}, unchanged {}, failed {}",
            report.listed, report.updated, report.unchanged, report.failed
        ),
        SyncOutcome::Skipped => println!("sync already running"),
    }
    Ok(())
}

pub async fn list(ctx: &Context, kind: Option<ItemKind>) -> Result<()> {
    let engine = ctx.engine();
    engine.sync_items().await?;
    let vault = engine.vault().lock().await;
    for line in render(&vault, kind) {
        println!("{line}");
    }
    Ok(())
}

/// One `kind  id  name` line per cached item, sorted by kind then name.
fn render(vault: &LocalVault, only: Option<ItemKind>) -> Vec<String> {
    let mut rows: Vec<(ItemKind, &str, &str)> = Vec::new();
    for kind in ItemKind::ALL {
        if only.is_some_and(|k| k != kind) {
            continue;
        }
        match kind {
            ItemKind::Credential => rows.extend(
                vault
                    .credentials()
                    .values()
                    .map(|c| (kind, c.id.as_str(), c.name.as_str())),
            ),
            ItemKind::Note => rows.extend(
                vault
                    .notes()
                    .values()
                    .map(|c| (kind, c.id.as_str(), c.name.as_str())),
            ),
            ItemKind::Card => rows.extend(
                vault
                    .cards()
                    .values()
                    .map(|c| (kind, c.id.as_str(), c.name.as_str())),
            ),
            ItemKind::Binary => rows.extend(
                vault
                    .binaries()
                    .values()
                    .map(|c| (kind, c.id.as_str(), c.name.as_str())),
            ),
        }
    }
    rows.sort_by(|a, b| (a.0.as_str(), a.2, a.1).cmp(&(b.0.as_str(), b.2, b.1)));
    rows.into_iter()
        .map(|(kind, id, name)| format!("{:<10}  {id}  {name}", kind.as_str()))
        .collect()
}

pub async fn add(ctx: &Context, args: AddArgs) -> Result<()> {
    let draft = draft_from(args)?;
    let summary = ctx.rpc.put_item(&draft).await?;
    println!("{} {}", summary.kind, summary.id);
    Ok(())
}

fn draft_from(args: AddArgs) -> Result<ItemDraft> {
    let (name, payload) = match args.item {
        AddItem::Credential {
            name,
            login,
            password,
            url,
        } => (
            name,
            ItemPayload::Credential(Credential {
                login,
                password,
                url,
            }),
        ),
        AddItem::Note { name, text } => (name, ItemPayload::Note(Note { text })),
        AddItem::Card {
            name,
            number,
            holder,
            expiry,
            cvc,
        } => (
            name,
            ItemPayload::Card(Card {
                number,
                holder,
                expiry,
                cvc,
            }),
        ),
        AddItem::Binary { name, file } => {
            let content = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::Custom(format!("not a file: {}", file.display())))?;
            (
                name,
                ItemPayload::Binary(BinaryInfo::from_bytes(file_name, &content)),
            )
        }
    };
    Ok(ItemDraft {
        id: args.id,
        name,
        payload,
        metadata: args.meta,
    })
}

pub async fn watch(ctx: &Context, interval_secs: u64, refresh_secs: u64) -> Result<()> {
    if !ctx.tokens.is_authorized() {
        return Err(keeper_client::SyncError::Unauthorized.into());
    }
    let engine = Arc::new(ctx.engine());
    let auth = Arc::new(ctx.authenticator());
    let cancel = CancellationToken::new();
    ctx.tokens.set_on_auth_failure({
        let cancel = cancel.clone();
        move || {
            warn!("session rejected by server, log in again");
            cancel.cancel();
        }
    });

    info!("syncing every {interval_secs}s, press Ctrl-C to stop");
    let refresher = auth.spawn_refresher(Duration::from_secs(refresh_secs.max(1)), cancel.clone());
    let syncer = engine.spawn_background(Duration::from_secs(interval_secs.max(1)), cancel.clone());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
    for handle in [refresher, syncer] {
        handle
            .await
            .map_err(|e| Error::Custom(format!("background task failed: {e}")))?;
    }

    let cached = engine.vault().lock().await.len();
    println!("stopped, {cached} items cached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use keeper_core::models::item::MetaEntry;

    use super::*;

    #[test]
    fn binary_draft_describes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, b"abc").unwrap();

        let draft = draft_from(AddArgs {
            id: None,
            meta: vec![MetaEntry::new("host", "prod")],
            item: AddItem::Binary {
                name: "deploy key".into(),
                file: path,
            },
        })
        .unwrap();

        assert_eq!(draft.name, "deploy key");
        assert_eq!(draft.metadata, vec![MetaEntry::new("host", "prod")]);
        let ItemPayload::Binary(info) = draft.payload else {
            panic!("expected binary payload");
        };
        assert_eq!(info.file_name, "key.pem");
        assert_eq!(info.size_bytes, 3);
    }

    #[test]
    fn missing_binary_file_is_io_error() {
        let result = draft_from(AddArgs {
            id: None,
            meta: vec![],
            item: AddItem::Binary {
                name: "x".into(),
                file: PathBuf::from("/definitely/not/here.bin"),
            },
        });
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn empty_vault_renders_nothing() {
        assert!(render(&LocalVault::default(), None).is_empty());
    }
}
