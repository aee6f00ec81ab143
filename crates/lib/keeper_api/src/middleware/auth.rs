//! Call authorization interceptor.
//!
//! Runs in front of every RPC. Public methods pass straight through; every
//! other call must carry a bearer token in the `authorization` metadata entry
//! that
//!
//! 1. validates under the [`TokenCodec`] as an access token, and
//! 2. has a live session binding resolving to the same user.
//!
//! On success the caller's identity is attached to the request as an
//! [`AuthenticatedUser`] extension. Every rejection carries one of two fixed
//! messages so callers cannot tell expired, forged and revoked tokens apart.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use keeper_core::auth::{SessionError, SessionStore, TokenCodec, TokenKind};
use keeper_core::rpc::{AUTHORIZATION_METADATA, methods};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::error::AppError;

/// Rejection message when no token was presented.
pub const MISSING_TOKEN: &str = "missing authorization token";

/// Rejection message for every other authentication failure.
pub const INVALID_TOKEN: &str = "invalid token";

/// Unary methods callable without a token.
const UNARY_PUBLIC_METHODS: &[&str] = &[methods::REGISTER, methods::LOGIN];

/// Streaming methods callable without a token.
const STREAM_PUBLIC_METHODS: &[&str] = &[methods::REGISTER, methods::LOGIN, methods::REFLECTION];

/// Identity of the caller, set by the interceptor.
///
/// Handlers take this as `Extension<AuthenticatedUser>`; it is the only
/// source of "who is calling". It cannot be built outside this crate.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    user_id: String,
    access_token: String,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The bearer token this call was authorized with.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// Authorization decision shared by the unary and streaming interceptors.
pub struct Authorizer {
    codec: Arc<TokenCodec>,
    sessions: Arc<dyn SessionStore>,
    public_methods: &'static [&'static str],
}

impl Authorizer {
    /// Authorizer for unary calls (registration and login are public).
    pub fn unary(codec: Arc<TokenCodec>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            codec,
            sessions,
            public_methods: UNARY_PUBLIC_METHODS,
        }
    }

    /// Authorizer for streaming calls (reflection is public as well).
    pub fn streaming(codec: Arc<TokenCodec>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            codec,
            sessions,
            public_methods: STREAM_PUBLIC_METHODS,
        }
    }

    /// Whether `method` bypasses authorization. Exact match only.
    pub fn is_public(&self, method: &str) -> bool {
        self.public_methods.contains(&method)
    }

    /// Decide a call. `Ok(None)` means the method is public.
    pub async fn authorize(
        &self,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<Option<AuthenticatedUser>, AppError> {
        if self.is_public(method) {
            return Ok(None);
        }

        let token = extract_token(headers).ok_or_else(|| {
            debug!(method, "rejecting call without token");
            AppError::Unauthenticated(MISSING_TOKEN.into())
        })?;

        let claims = self
            .codec
            .validate(token, TokenKind::Access)
            .map_err(|e| {
                debug!(method, error = %e, "rejecting call with invalid token");
                AppError::Unauthenticated(INVALID_TOKEN.into())
            })?;

        let bound = self.sessions.get(token).await.map_err(|e| {
            match &e {
                SessionError::NotFound => {
                    debug!(method, user_id = %claims.sub, "no session for token");
                }
                SessionError::Unavailable(reason) => {
                    error!(method, error = %reason, "session store unavailable");
                }
            }
            AppError::Unauthenticated(INVALID_TOKEN.into())
        })?;

        if bound != claims.sub {
            warn!(
                method,
                token_user = %claims.sub,
                session_user = %bound,
                "session bound to a different user"
            );
            return Err(AppError::Unauthenticated(INVALID_TOKEN.into()));
        }

        Ok(Some(AuthenticatedUser {
            user_id: claims.sub,
            access_token: token.to_string(),
        }))
    }
}

/// Pull the bearer token out of call metadata. The whole value is the token.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION_METADATA)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware for unary methods.
pub async fn unary_interceptor(
    State(auth): State<Arc<Authorizer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.uri().path().to_string();
    if let Some(user) = auth.authorize(&method, request.headers()).await? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Axum middleware for streaming methods.
///
/// Same decision as [`unary_interceptor`]. The handler runs inside a span
/// carrying the caller; the response body is polled after it returns, outside
/// that span.
pub async fn stream_interceptor(
    State(auth): State<Arc<Authorizer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.uri().path().to_string();
    let user = auth.authorize(&method, request.headers()).await?;
    let span = match &user {
        Some(user) => info_span!("stream", method = %method, user_id = %user.user_id()),
        None => info_span!("stream", method = %method),
    };
    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).instrument(span).await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::HeaderValue;
    use keeper_core::auth::MemorySessionStore;

    use super::*;

    fn authorizer(sessions: Arc<MemorySessionStore>) -> (Authorizer, Arc<TokenCodec>) {
        let codec = Arc::new(TokenCodec::new(b"test-secret"));
        (Authorizer::unary(codec.clone(), sessions), codec)
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION_METADATA, HeaderValue::from_str(token).unwrap());
        headers
    }

    #[test]
    fn allow_list_is_exact() {
        let (auth, _) = authorizer(Arc::new(MemorySessionStore::new()));
        assert!(auth.is_public(methods::LOGIN));
        assert!(auth.is_public(methods::REGISTER));
        assert!(!auth.is_public(methods::REFLECTION));
        assert!(!auth.is_public("/keeper.v1.Auth/Login/"));
        assert!(!auth.is_public("/keeper.v1.auth/login"));
    }

    #[test]
    fn streaming_allows_reflection() {
        let codec = Arc::new(TokenCodec::new(b"s"));
        let auth = Authorizer::streaming(codec, Arc::new(MemorySessionStore::new()));
        assert!(auth.is_public(methods::REFLECTION));
        assert!(!auth.is_public(methods::STREAM_ITEMS));
    }

    #[tokio::test]
    async fn public_method_needs_no_token() {
        let (auth, _) = authorizer(Arc::new(MemorySessionStore::new()));
        let decision = auth.authorize(methods::LOGIN, &HeaderMap::new()).await.unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let (auth, _) = authorizer(Arc::new(MemorySessionStore::new()));
        let err = auth
            .authorize(methods::LIST_ITEMS, &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(m) if m == MISSING_TOKEN));
    }

    #[tokio::test]
    async fn bound_token_is_accepted() {
        let sessions = Arc::new(MemorySessionStore::new());
        let (auth, codec) = authorizer(sessions.clone());
        let issued = codec
            .issue("user-1", TokenKind::Access, chrono::Duration::minutes(5))
            .unwrap();
        sessions
            .put(&issued.token, "user-1", Duration::from_secs(300))
            .await
            .unwrap();

        let user = auth
            .authorize(methods::LIST_ITEMS, &headers_with(&issued.token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.user_id(), "user-1");
        assert_eq!(user.access_token(), issued.token);
    }

    #[tokio::test]
    async fn unbound_token_is_rejected() {
        let sessions = Arc::new(MemorySessionStore::new());
        let (auth, codec) = authorizer(sessions);
        let issued = codec
            .issue("user-1", TokenKind::Access, chrono::Duration::minutes(5))
            .unwrap();
        let err = auth
            .authorize(methods::LIST_ITEMS, &headers_with(&issued.token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(m) if m == INVALID_TOKEN));
    }

    #[tokio::test]
    async fn token_bound_to_other_user_is_rejected() {
        let sessions = Arc::new(MemorySessionStore::new());
        let (auth, codec) = authorizer(sessions.clone());
        let issued = codec
            .issue("user-1", TokenKind::Access, chrono::Duration::minutes(5))
            .unwrap();
        sessions
            .put(&issued.token, "user-2", Duration::from_secs(300))
            .await
            .unwrap();
        let err = auth
            .authorize(methods::LIST_ITEMS, &headers_with(&issued.token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(m) if m == INVALID_TOKEN));
    }

    #[tokio::test]
    async fn refresh_token_cannot_authorize_calls() {
        let sessions = Arc::new(MemorySessionStore::new());
        let (auth, codec) = authorizer(sessions.clone());
        let issued = codec
            .issue("user-1", TokenKind::Refresh, chrono::Duration::days(1))
            .unwrap();
        sessions
            .put(&issued.token, "user-1", Duration::from_secs(300))
            .await
            .unwrap();
        let err = auth
            .authorize(methods::LIST_ITEMS, &headers_with(&issued.token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(m) if m == INVALID_TOKEN));
    }
}
