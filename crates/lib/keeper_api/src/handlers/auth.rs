//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use keeper_core::models::auth::TokenPair;
use keeper_core::rpc::{CredentialsRequest, LogoutRequest, LogoutResponse, RefreshRequest};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::auth;

/// `Auth/Register`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = auth::register(&state, &body.login, &body.password).await?;
    Ok(Json(pair))
}

/// `Auth/Login`: authenticate with login + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = auth::login(&state, &body.login, &body.password).await?;
    Ok(Json(pair))
}

/// `Auth/Refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = auth::refresh(&state, &user, &body.refresh_token).await?;
    Ok(Json(pair))
}

/// `Auth/Logout`: drop the caller's session bindings.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<LogoutResponse>> {
    let resp = auth::logout(&state, &user, body.refresh_token.as_deref()).await?;
    Ok(Json(resp))
}
