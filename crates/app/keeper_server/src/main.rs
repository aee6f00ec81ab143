//! Keeper API server binary.
//!
//! Serves the vault RPC methods over HTTP. Items live in PostgreSQL and
//! session bindings in Redis, or both in process memory with `--in-memory`.

use std::sync::Arc;

use clap::Parser;
use keeper_api::AppState;
use keeper_api::config::ApiConfig;
use keeper_core::auth::{MemorySessionStore, RedisSessionStore, SessionStore};
use keeper_core::vault::{MemoryVaultRepository, PgVaultRepository, VaultRepository};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "keeper_server", version, about = "Keeper vault API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3200")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/keeper"
    )]
    database_url: String,

    /// Redis connection URL for session bindings.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users, items and sessions in memory. Nothing survives a restart.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keeper_api=debug,keeper_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig {
        bind_addr: args.bind_addr.clone(),
        database_url: args.database_url.clone(),
        redis_url: args.redis_url.clone(),
        ..ApiConfig::from_env()
    };

    info!(
        bind_addr = %config.bind_addr,
        in_memory = args.in_memory,
        access_ttl_secs = config.access_token_ttl.num_seconds(),
        refresh_ttl_secs = config.refresh_token_ttl.num_seconds(),
        "starting keeper_server"
    );

    let repo: Arc<dyn VaultRepository>;
    let sessions: Arc<dyn SessionStore>;
    if args.in_memory {
        warn!("in-memory mode: all data is lost on shutdown");
        let store = Arc::new(MemorySessionStore::new());
        store.spawn_cleanup_task();
        repo = Arc::new(MemoryVaultRepository::new());
        sessions = store;
    } else {
        info!(max_connections = args.max_connections, "connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        info!("running database migrations");
        keeper_core::migrate::migrate(&pool).await?;

        info!("connecting to session store");
        repo = Arc::new(PgVaultRepository::new(pool));
        sessions = Arc::new(RedisSessionStore::connect(&config.redis_url).await?);
    }

    let state = AppState::new(config.clone(), repo, sessions);
    let app = keeper_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "RPC API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
