//! RPC wire contract shared by `keeper_api` and `keeper_client`.
//!
//! Every call is an HTTP `POST` to the fully-qualified method name with a
//! JSON body. Streaming methods answer newline-delimited JSON.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::item::{ItemSummary, MetaEntry};

/// Call metadata entry carrying the bearer token. No scheme prefix.
pub const AUTHORIZATION_METADATA: &str = "authorization";

/// Default page size for `ListItems`.
pub const DEFAULT_PAGE_SIZE: i32 = 10;

/// Largest page the server will return.
pub const MAX_PAGE_SIZE: i32 = 100;

/// Content type of streaming responses.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Fully-qualified method names.
pub mod methods {
    pub const REGISTER: &str = "/keeper.v1.Auth/Register";
    pub const LOGIN: &str = "/keeper.v1.Auth/Login";
    pub const REFRESH: &str = "/keeper.v1.Auth/Refresh";
    pub const LOGOUT: &str = "/keeper.v1.Auth/Logout";

    pub const LIST_ITEMS: &str = "/keeper.v1.Items/ListItems";
    pub const GET_ITEM_METADATA: &str = "/keeper.v1.Items/GetItemMetadata";
    pub const PUT_ITEM: &str = "/keeper.v1.Items/PutItem";
    pub const GET_CREDENTIAL: &str = "/keeper.v1.Credentials/GetCredential";
    pub const GET_NOTE: &str = "/keeper.v1.Notes/GetNote";
    pub const GET_CARD: &str = "/keeper.v1.Cards/GetCard";
    pub const GET_BINARY: &str = "/keeper.v1.Binaries/GetBinary";

    pub const STREAM_ITEMS: &str = "/keeper.v1.Items/StreamItems";
    pub const REFLECTION: &str = "/keeper.v1.Reflection/ListMethods";

    /// Unary methods served by the API.
    pub const UNARY: &[&str] = &[
        REGISTER,
        LOGIN,
        REFRESH,
        LOGOUT,
        LIST_ITEMS,
        GET_ITEM_METADATA,
        PUT_ITEM,
        GET_CREDENTIAL,
        GET_NOTE,
        GET_CARD,
        GET_BINARY,
    ];

    /// Streaming methods served by the API.
    pub const STREAMING: &[&str] = &[STREAM_ITEMS, REFLECTION];
}

/// Status code carried in error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Unauthenticated,
    Unavailable,
    Internal,
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RpcCode::InvalidArgument => "invalid_argument",
            RpcCode::NotFound => "not_found",
            RpcCode::AlreadyExists => "already_exists",
            RpcCode::Unauthenticated => "unauthenticated",
            RpcCode::Unavailable => "unavailable",
            RpcCode::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

/// `Register` / `Login` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub login: String,
    pub password: String,
}

/// `Refresh` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `Logout` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// `Logout` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// `ListItems` request. `page` is 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListItemsRequest {
    pub page: i32,
    pub page_size: i32,
}

/// `ListItems` response. `count` is the number of items on this page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemsResponse {
    pub items: Vec<ItemSummary>,
    pub count: i32,
}

/// Request addressing one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub id: String,
}

/// `GetItemMetadata` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub entries: Vec<MetaEntry>,
}

/// Typed `Get*` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse<T> {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub item: T,
}
