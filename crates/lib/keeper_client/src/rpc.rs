//! Typed RPC client for the Keeper API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keeper_core::models::auth::TokenPair;
use keeper_core::models::item::{BinaryInfo, Card, Credential, ItemDraft, ItemSummary, MetaEntry, Note};
use keeper_core::rpc::{
    AUTHORIZATION_METADATA, CredentialsRequest, ItemRequest, ItemResponse, ListItemsRequest,
    ListItemsResponse, LogoutRequest, LogoutResponse, MetadataResponse, RefreshRequest, RpcCode,
    RpcStatus, methods,
};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::tokens::TokenManager;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote vault operations used by the client.
#[async_trait]
pub trait VaultRpc: Send + Sync {
    async fn register(&self, login: &str, password: &str) -> Result<TokenPair, ClientError>;
    async fn login(&self, login: &str, password: &str) -> Result<TokenPair, ClientError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError>;
    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), ClientError>;

    /// One page of item summaries. `page` is 1-based.
    async fn list_items(&self, page: i32, page_size: i32)
    -> Result<ListItemsResponse, ClientError>;
    async fn item_metadata(&self, id: &str) -> Result<Vec<MetaEntry>, ClientError>;
    async fn get_credential(&self, id: &str) -> Result<ItemResponse<Credential>, ClientError>;
    async fn get_note(&self, id: &str) -> Result<ItemResponse<Note>, ClientError>;
    async fn get_card(&self, id: &str) -> Result<ItemResponse<Card>, ClientError>;
    async fn get_binary(&self, id: &str) -> Result<ItemResponse<BinaryInfo>, ClientError>;
    async fn put_item(&self, draft: &ItemDraft) -> Result<ItemSummary, ClientError>;
}

/// [`VaultRpc`] over HTTP.
///
/// Attaches the current access token to every call. An `unauthenticated`
/// answer to a call that carried a token clears the local tokens through
/// [`TokenManager::handle_auth_failure`]; the call is never retried.
pub struct HttpVaultClient {
    http: reqwest::Client,
    base: Url,
    tokens: Arc<TokenManager>,
}

impl HttpVaultClient {
    pub fn new(server_url: &str, tokens: Arc<TokenManager>) -> Result<Self, ClientError> {
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, base, tokens })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.base.join(method.trim_start_matches('/'))?;
        let token = self.tokens.access_token();
        let sent_token = token.is_some();

        let mut request = self.http.post(url).json(body);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION_METADATA, token);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Resp>().await?);
        }

        let bytes = response.bytes().await?;
        let (code, message) = match serde_json::from_slice::<RpcStatus>(&bytes) {
            Ok(s) => (s.code, s.message),
            Err(_) => (
                code_for_status(status),
                String::from_utf8_lossy(&bytes).into_owned(),
            ),
        };
        debug!(method, %code, %message, "call failed");

        if code == RpcCode::Unauthenticated {
            if sent_token {
                self.tokens.handle_auth_failure();
            }
            return Err(ClientError::Unauthenticated(message));
        }
        Err(ClientError::Rpc { code, message })
    }
}

fn code_for_status(status: StatusCode) -> RpcCode {
    match status {
        StatusCode::BAD_REQUEST => RpcCode::InvalidArgument,
        StatusCode::NOT_FOUND => RpcCode::NotFound,
        StatusCode::CONFLICT => RpcCode::AlreadyExists,
        StatusCode::UNAUTHORIZED => RpcCode::Unauthenticated,
        StatusCode::SERVICE_UNAVAILABLE => RpcCode::Unavailable,
        _ => RpcCode::Internal,
    }
}

#[async_trait]
impl VaultRpc for HttpVaultClient {
    async fn register(&self, login: &str, password: &str) -> Result<TokenPair, ClientError> {
        let body = CredentialsRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        self.call(methods::REGISTER, &body).await
    }

    async fn login(&self, login: &str, password: &str) -> Result<TokenPair, ClientError> {
        let body = CredentialsRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        self.call(methods::LOGIN, &body).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.call(methods::REFRESH, &body).await
    }

    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), ClientError> {
        let body = LogoutRequest {
            refresh_token: refresh_token.map(str::to_string),
        };
        let _: LogoutResponse = self.call(methods::LOGOUT, &body).await?;
        Ok(())
    }

    async fn list_items(
        &self,
        page: i32,
        page_size: i32,
    ) -> Result<ListItemsResponse, ClientError> {
        self.call(methods::LIST_ITEMS, &ListItemsRequest { page, page_size })
            .await
    }

    async fn item_metadata(&self, id: &str) -> Result<Vec<MetaEntry>, ClientError> {
        let resp: MetadataResponse = self.call(methods::GET_ITEM_METADATA, &item(id)).await?;
        Ok(resp.entries)
    }

    async fn get_credential(&self, id: &str) -> Result<ItemResponse<Credential>, ClientError> {
        self.call(methods::GET_CREDENTIAL, &item(id)).await
    }

    async fn get_note(&self, id: &str) -> Result<ItemResponse<Note>, ClientError> {
        self.call(methods::GET_NOTE, &item(id)).await
    }

    async fn get_card(&self, id: &str) -> Result<ItemResponse<Card>, ClientError> {
        self.call(methods::GET_CARD, &item(id)).await
    }

    async fn get_binary(&self, id: &str) -> Result<ItemResponse<BinaryInfo>, ClientError> {
        self.call(methods::GET_BINARY, &item(id)).await
    }

    async fn put_item(&self, draft: &ItemDraft) -> Result<ItemSummary, ClientError> {
        self.call(methods::PUT_ITEM, draft).await
    }
}

fn item(id: &str) -> ItemRequest {
    ItemRequest { id: id.to_string() }
}
