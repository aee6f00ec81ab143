//! Login flows that keep the [`TokenManager`] current.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::rpc::VaultRpc;
use crate::tokens::TokenManager;

/// Interval between background rotations; shorter than the server's
/// default access token lifetime.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Authenticator {
    rpc: Arc<dyn VaultRpc>,
    tokens: Arc<TokenManager>,
}

impl Authenticator {
    pub fn new(rpc: Arc<dyn VaultRpc>, tokens: Arc<TokenManager>) -> Self {
        Self { rpc, tokens }
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<(), ClientError> {
        let pair = self.rpc.register(login, password).await?;
        self.tokens
            .update_tokens(&pair.access_token, &pair.refresh_token)?;
        info!(login, "registered");
        Ok(())
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<(), ClientError> {
        let pair = self.rpc.login(login, password).await?;
        self.tokens
            .update_tokens(&pair.access_token, &pair.refresh_token)?;
        info!(login, "logged in");
        Ok(())
    }

    /// Rotate the token pair using the held refresh token.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let refresh = self.tokens.refresh_token().ok_or(ClientError::NotLoggedIn)?;
        let pair = self.rpc.refresh(&refresh).await?;
        self.tokens
            .update_tokens(&pair.access_token, &pair.refresh_token)?;
        Ok(())
    }

    /// Revoke the server-side session and forget the local tokens.
    ///
    /// Local tokens are dropped even when the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if !self.tokens.is_authorized() {
            return Err(ClientError::NotLoggedIn);
        }
        let refresh = self.tokens.refresh_token();
        let remote = self.rpc.logout(refresh.as_deref()).await;
        self.tokens.clear_tokens()?;
        match remote {
            Ok(()) | Err(ClientError::Unauthenticated(_)) => Ok(()),
            Err(e) => {
                warn!(error = %e, "server logout failed, local tokens dropped");
                Err(e)
            }
        }
    }

    /// Rotate the pair every `every` until `cancel` fires, starting now.
    ///
    /// Stops on its own once the tokens are gone or the server rejects the
    /// session; other failures are retried on the next tick.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let auth = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match auth.refresh().await {
                    Ok(()) => debug!("token pair rotated"),
                    Err(e @ (ClientError::NotLoggedIn | ClientError::Unauthenticated(_))) => {
                        warn!(error = %e, "token rotation stopped");
                        break;
                    }
                    Err(e) => warn!(error = %e, "token rotation failed, retrying"),
                }
            }
            debug!("token refresher stopped");
        })
    }
}
