//! End-to-end: a real API listener on an ephemeral port, driven through the
//! HTTP client, token manager and sync engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use keeper_api::{AppState, config::ApiConfig};
use keeper_client::{
    Authenticator, ClientError, FileTokenStorage, HttpVaultClient, SyncEngine, SyncError,
    SyncOutcome, TokenManager, VaultRpc,
};
use keeper_core::auth::MemorySessionStore;
use keeper_core::models::item::{Credential, ItemDraft, ItemPayload, MetaEntry, Note};
use keeper_core::vault::MemoryVaultRepository;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn spawn_server() -> String {
    spawn_server_with(chrono::Duration::minutes(15)).await
}

async fn spawn_server_with(access_token_ttl: chrono::Duration) -> String {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url: String::new(),
        redis_url: String::new(),
        jwt_secret: "e2e-secret".into(),
        access_token_ttl,
        refresh_token_ttl: chrono::Duration::days(30),
    };
    let state = AppState::new(
        config,
        Arc::new(MemoryVaultRepository::new()),
        Arc::new(MemorySessionStore::new()),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, keeper_api::router(state))
            .await
            .expect("serve");
    });
    format!("http://{addr}")
}

struct Client {
    _dir: TempDir,
    dir_path: std::path::PathBuf,
    tokens: Arc<TokenManager>,
    rpc: Arc<HttpVaultClient>,
    auth: Authenticator,
}

fn client(url: &str) -> Client {
    let dir = tempfile::tempdir().expect("tempdir");
    let dir_path = dir.path().to_path_buf();
    let tokens = Arc::new(TokenManager::new(Box::new(FileTokenStorage::in_dir(
        &dir_path,
    ))));
    let rpc = Arc::new(HttpVaultClient::new(url, Arc::clone(&tokens)).expect("client"));
    let auth = Authenticator::new(rpc.clone(), Arc::clone(&tokens));
    Client {
        _dir: dir,
        dir_path,
        tokens,
        rpc,
        auth,
    }
}

fn credential_draft() -> ItemDraft {
    ItemDraft {
        id: None,
        name: "github".into(),
        payload: ItemPayload::Credential(Credential {
            login: "alice".into(),
            password: "s3cret-pass".into(),
            url: Some("https://github.com".into()),
        }),
        metadata: vec![MetaEntry::new("folder", "work")],
    }
}

#[tokio::test]
async fn register_put_and_sync() {
    let url = spawn_server().await;
    let c = client(&url);

    c.auth.register("alice", "long-enough-pw").await.unwrap();
    assert!(c.tokens.is_authorized());

    // The pair survives a restart.
    let reloaded = TokenManager::new(Box::new(FileTokenStorage::in_dir(&c.dir_path)));
    assert!(reloaded.load_tokens().unwrap());
    assert_eq!(reloaded.access_token(), c.tokens.access_token());

    let created = c.rpc.put_item(&credential_draft()).await.unwrap();
    c.rpc
        .put_item(&ItemDraft {
            id: None,
            name: "todo".into(),
            payload: ItemPayload::Note(Note {
                text: "buy milk".into(),
            }),
            metadata: vec![],
        })
        .await
        .unwrap();

    let engine = SyncEngine::new(c.rpc.clone(), Arc::clone(&c.tokens)).with_page_size(1);
    let outcome = engine.sync_items().await.unwrap();
    let SyncOutcome::Completed(report) = outcome else {
        panic!("pass skipped");
    };
    assert_eq!(report.listed, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(report.failed, 0);

    let vault = engine.vault().lock().await;
    let cached = &vault.credentials()[&created.id];
    assert_eq!(cached.name, "github");
    assert_eq!(cached.item.login, "alice");
    assert_eq!(cached.metadata, vec![MetaEntry::new("folder", "work")]);
    assert_eq!(vault.notes().len(), 1);
    assert!(vault.watermark().is_some());
}

#[tokio::test]
async fn refresh_rotates_stored_pair() {
    let url = spawn_server().await;
    let c = client(&url);
    c.auth.register("bob", "long-enough-pw").await.unwrap();
    let before = c.tokens.refresh_token();

    c.auth.refresh().await.unwrap();

    assert!(c.tokens.is_authorized());
    assert_ne!(c.tokens.refresh_token(), before);
    assert!(c.rpc.list_items(1, 10).await.is_ok());
}

#[tokio::test]
async fn wrong_password_is_unauthenticated() {
    let url = spawn_server().await;
    let c = client(&url);
    c.auth.register("carol", "long-enough-pw").await.unwrap();
    c.tokens.clear_tokens().unwrap();

    let err = c.auth.login("carol", "not-the-password").await.unwrap_err();
    assert!(err.is_unauthenticated(), "{err}");
    assert!(!c.tokens.is_authorized());
}

#[tokio::test]
async fn revoked_session_clears_tokens_and_keeps_caches() {
    let url = spawn_server().await;
    let c = client(&url);
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    c.tokens.set_on_auth_failure(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    c.auth.register("dave", "long-enough-pw").await.unwrap();
    c.rpc.put_item(&credential_draft()).await.unwrap();
    let engine = SyncEngine::new(c.rpc.clone(), Arc::clone(&c.tokens));
    engine.sync_items().await.unwrap();
    let mark = engine.vault().lock().await.watermark();

    // Revoke server-side while the client still holds the tokens.
    c.rpc.logout(None).await.unwrap();
    assert!(c.tokens.is_authorized());

    let err = engine.sync_items().await.unwrap_err();
    assert!(matches!(err, SyncError::Rpc(ClientError::Unauthenticated(_))));
    assert!(!c.tokens.is_authorized());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(!c.dir_path.join("tokens.json").exists());

    let vault = engine.vault().lock().await;
    assert_eq!(vault.credentials().len(), 1);
    assert_eq!(vault.watermark(), mark);
    drop(vault);

    assert!(matches!(
        engine.sync_items().await,
        Err(SyncError::Unauthorized)
    ));
}

#[tokio::test]
async fn logout_forgets_tokens() {
    let url = spawn_server().await;
    let c = client(&url);
    c.auth.register("erin", "long-enough-pw").await.unwrap();

    c.auth.logout().await.unwrap();

    assert!(!c.tokens.is_authorized());
    assert!(matches!(
        c.auth.logout().await,
        Err(ClientError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn refresher_keeps_session_alive_past_access_ttl() {
    let url = spawn_server_with(chrono::Duration::seconds(2)).await;
    let c = client(&url);
    c.auth.register("frank", "long-enough-pw").await.unwrap();
    let auth = Arc::new(Authenticator::new(c.rpc.clone(), Arc::clone(&c.tokens)));
    let cancel = CancellationToken::new();

    let handle = auth.spawn_refresher(Duration::from_millis(500), cancel.clone());
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(c.rpc.list_items(1, 10).await.is_ok());
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(c.tokens.is_authorized());
}

#[tokio::test]
async fn refresher_stops_once_session_is_revoked() {
    let url = spawn_server().await;
    let c = client(&url);
    c.auth.register("gina", "long-enough-pw").await.unwrap();
    c.rpc.logout(None).await.unwrap();
    let auth = Arc::new(Authenticator::new(c.rpc.clone(), Arc::clone(&c.tokens)));

    let handle = auth.spawn_refresher(Duration::from_millis(50), CancellationToken::new());

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(!c.tokens.is_authorized());
}
