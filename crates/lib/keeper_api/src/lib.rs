//! # keeper_api
//!
//! RPC server library for Keeper.
//!
//! Every method is served as `POST <method name>`; see [`keeper_core::rpc`]
//! for the wire contract. All calls pass through the call authorization
//! interceptor in [`middleware::auth`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use keeper_core::auth::{SessionStore, TokenCodec};
use keeper_core::rpc::methods;
use keeper_core::vault::VaultRepository;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, items, reflection};
use crate::middleware::auth::{Authorizer, stream_interceptor, unary_interceptor};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User and item storage.
    pub repo: Arc<dyn VaultRepository>,
    /// Live token → user bindings.
    pub sessions: Arc<dyn SessionStore>,
    /// Token codec built from `config.jwt_secret`.
    pub codec: Arc<TokenCodec>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        repo: Arc<dyn VaultRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(config.jwt_secret.as_bytes()));
        Self {
            repo,
            sessions,
            codec,
            config,
        }
    }
}

/// Builds the Axum router with all methods and shared state.
pub fn router(state: AppState) -> Router {
    let unary_auth = Arc::new(Authorizer::unary(
        state.codec.clone(),
        state.sessions.clone(),
    ));
    let stream_auth = Arc::new(Authorizer::streaming(
        state.codec.clone(),
        state.sessions.clone(),
    ));

    let unary = Router::new()
        .route(methods::REGISTER, post(auth::register_handler))
        .route(methods::LOGIN, post(auth::login_handler))
        .route(methods::REFRESH, post(auth::refresh_handler))
        .route(methods::LOGOUT, post(auth::logout_handler))
        .route(methods::LIST_ITEMS, post(items::list_items_handler))
        .route(methods::GET_ITEM_METADATA, post(items::item_metadata_handler))
        .route(methods::PUT_ITEM, post(items::put_item_handler))
        .route(methods::GET_CREDENTIAL, post(items::get_credential_handler))
        .route(methods::GET_NOTE, post(items::get_note_handler))
        .route(methods::GET_CARD, post(items::get_card_handler))
        .route(methods::GET_BINARY, post(items::get_binary_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            unary_auth,
            unary_interceptor,
        ));

    let streaming = Router::new()
        .route(methods::STREAM_ITEMS, post(items::stream_items_handler))
        .route(methods::REFLECTION, post(reflection::list_methods_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            stream_auth,
            stream_interceptor,
        ));

    Router::new()
        .merge(unary)
        .merge(streaming)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
