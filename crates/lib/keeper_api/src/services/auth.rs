//! Authentication service: register/login/refresh/logout flows.
//!
//! Every token handed out is also bound in the session store for exactly its
//! own lifetime, which is what makes it usable against the interceptor.

use keeper_core::auth::password::{hash_password, verify_password};
use keeper_core::auth::{SessionError, TokenKind};
use keeper_core::models::auth::TokenPair;
use keeper_core::rpc::LogoutResponse;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthenticatedUser, INVALID_TOKEN};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

fn store_error(e: SessionError) -> AppError {
    match e {
        SessionError::NotFound => AppError::Unauthenticated(INVALID_TOKEN.into()),
        SessionError::Unavailable(m) => AppError::Unavailable(format!("session store: {m}")),
    }
}

/// Issue an access/refresh pair for `user_id` and bind both tokens.
async fn issue_pair(state: &AppState, user_id: &str) -> AppResult<TokenPair> {
    let access = state
        .codec
        .issue(user_id, TokenKind::Access, state.config.access_token_ttl)?;
    let refresh = state
        .codec
        .issue(user_id, TokenKind::Refresh, state.config.refresh_token_ttl)?;

    state
        .sessions
        .put(&access.token, user_id, access.remaining())
        .await
        .map_err(store_error)?;
    if let Err(e) = state
        .sessions
        .put(&refresh.token, user_id, refresh.remaining())
        .await
    {
        // The caller never receives this access token.
        if let Err(revoke_err) = state.sessions.revoke(&access.token).await {
            warn!(user_id, error = %revoke_err, "failed to drop orphaned access binding");
        }
        return Err(store_error(e));
    }

    Ok(TokenPair {
        access_token: access.token,
        refresh_token: refresh.token,
    })
}

/// Register a new user account and open a session for it.
pub async fn register(state: &AppState, login: &str, password: &str) -> AppResult<TokenPair> {
    let login = login.trim();
    if login.is_empty() {
        return Err(AppError::InvalidArgument("login is required".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidArgument(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let pw_hash = hash_password(password)?;
    let user = state.repo.create_user(login, &pw_hash).await?;
    info!(user_id = %user.id, login, "user registered");

    issue_pair(state, &user.id).await
}

/// Authenticate with login + password.
pub async fn login(state: &AppState, login: &str, password: &str) -> AppResult<TokenPair> {
    let invalid = || AppError::Unauthenticated("invalid credentials".into());

    let Some(found) = state.repo.find_user_by_login(login.trim()).await? else {
        return Err(invalid());
    };
    if !verify_password(password, &found.password_hash)? {
        return Err(invalid());
    }

    info!(user_id = %found.user.id, "user logged in");
    issue_pair(state, &found.user.id).await
}

/// Exchange a refresh token for a new pair. The old refresh token is revoked.
pub async fn refresh(
    state: &AppState,
    caller: &AuthenticatedUser,
    refresh_token: &str,
) -> AppResult<TokenPair> {
    let claims = state.codec.validate(refresh_token, TokenKind::Refresh)?;
    let bound = state
        .sessions
        .get(refresh_token)
        .await
        .map_err(store_error)?;
    if bound != claims.sub || claims.sub != caller.user_id() {
        warn!(caller = %caller.user_id(), "refresh token does not belong to caller");
        return Err(AppError::Unauthenticated(INVALID_TOKEN.into()));
    }

    state
        .sessions
        .revoke(refresh_token)
        .await
        .map_err(store_error)?;
    issue_pair(state, caller.user_id()).await
}

/// Revoke the caller's session and, optionally, its refresh token.
pub async fn logout(
    state: &AppState,
    caller: &AuthenticatedUser,
    refresh_token: Option<&str>,
) -> AppResult<LogoutResponse> {
    state
        .sessions
        .revoke(caller.access_token())
        .await
        .map_err(store_error)?;

    if let Some(token) = refresh_token {
        // Only the caller's own refresh token may be revoked this way.
        match state.sessions.get(token).await {
            Ok(owner) if owner == caller.user_id() => {
                state.sessions.revoke(token).await.map_err(store_error)?;
            }
            Ok(_) | Err(SessionError::NotFound) => {}
            Err(e) => return Err(store_error(e)),
        }
    }

    info!(user_id = %caller.user_id(), "user logged out");
    Ok(LogoutResponse { success: true })
}
