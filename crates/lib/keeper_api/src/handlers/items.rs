//! Vault item request handlers.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures_util::stream;
use keeper_core::models::item::{
    BinaryInfo, Card, Credential, ItemDraft, ItemPayload, ItemSummary, Note,
};
use keeper_core::rpc::{
    ItemRequest, ItemResponse, ListItemsRequest, ListItemsResponse, MAX_PAGE_SIZE,
    MetadataResponse, NDJSON_CONTENT_TYPE,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// `Items/ListItems`: one page of the caller's items.
pub async fn list_items_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ListItemsRequest>,
) -> AppResult<Json<ListItemsResponse>> {
    let items = state
        .repo
        .list_items(user.user_id(), body.page, body.page_size)
        .await?;
    let count = i32::try_from(items.len()).map_err(|e| AppError::Internal(e.to_string()))?;
    debug!(user_id = %user.user_id(), page = body.page, count, "listed items");
    Ok(Json(ListItemsResponse { items, count }))
}

/// `Items/GetItemMetadata`: key/value set attached to an item.
pub async fn item_metadata_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ItemRequest>,
) -> AppResult<Json<MetadataResponse>> {
    let entries = state.repo.item_metadata(user.user_id(), &body.id).await?;
    Ok(Json(MetadataResponse { entries }))
}

/// `Items/PutItem`: create or replace an item.
pub async fn put_item_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ItemDraft>,
) -> AppResult<Json<ItemSummary>> {
    let summary = state.repo.put_item(user.user_id(), body).await?;
    debug!(user_id = %user.user_id(), item_id = %summary.id, kind = %summary.kind, "item stored");
    Ok(Json(summary))
}

/// Load an item and unwrap the payload variant the caller asked for.
async fn get_typed<T>(
    state: &AppState,
    user: &AuthenticatedUser,
    id: &str,
    pick: fn(ItemPayload) -> Option<T>,
) -> AppResult<Json<ItemResponse<T>>> {
    let stored = state.repo.get_item(user.user_id(), id).await?;
    let summary = stored.summary;
    let item = pick(stored.payload).ok_or_else(|| {
        AppError::NotFound(format!("item {id} is a {}", summary.kind))
    })?;
    Ok(Json(ItemResponse {
        id: summary.id,
        name: summary.name,
        updated_at: summary.updated_at,
        item,
    }))
}

/// `Credentials/GetCredential`.
pub async fn get_credential_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ItemRequest>,
) -> AppResult<Json<ItemResponse<Credential>>> {
    get_typed(&state, &user, &body.id, |p| match p {
        ItemPayload::Credential(c) => Some(c),
        _ => None,
    })
    .await
}

/// `Notes/GetNote`.
pub async fn get_note_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ItemRequest>,
) -> AppResult<Json<ItemResponse<Note>>> {
    get_typed(&state, &user, &body.id, |p| match p {
        ItemPayload::Note(n) => Some(n),
        _ => None,
    })
    .await
}

/// `Cards/GetCard`.
pub async fn get_card_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ItemRequest>,
) -> AppResult<Json<ItemResponse<Card>>> {
    get_typed(&state, &user, &body.id, |p| match p {
        ItemPayload::Card(c) => Some(c),
        _ => None,
    })
    .await
}

/// `Binaries/GetBinary`.
pub async fn get_binary_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ItemRequest>,
) -> AppResult<Json<ItemResponse<BinaryInfo>>> {
    get_typed(&state, &user, &body.id, |p| match p {
        ItemPayload::Binary(b) => Some(b),
        _ => None,
    })
    .await
}

/// Encode values as newline-delimited JSON.
pub(crate) fn ndjson<T: Serialize>(values: &[T]) -> Result<Bytes, serde_json::Error> {
    let mut buf = Vec::new();
    for value in values {
        serde_json::to_writer(&mut buf, value)?;
        buf.push(b'\n');
    }
    Ok(Bytes::from(buf))
}

/// `Items/StreamItems`: all of the caller's summaries as NDJSON.
///
/// Pages are read from the repository one at a time as the client consumes
/// the body, so memory stays bounded by one page.
pub async fn stream_items_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Response {
    let repo = state.repo.clone();
    let user_id = user.user_id().to_string();

    let pages = stream::unfold(Some(1), move |page| {
        let repo = repo.clone();
        let user_id = user_id.clone();
        async move {
            let page = page?;
            let chunk = match repo.list_items(&user_id, page, MAX_PAGE_SIZE).await {
                Ok(items) => {
                    let next = (items.len() == MAX_PAGE_SIZE as usize).then_some(page + 1);
                    match ndjson(&items) {
                        Ok(bytes) => (Ok(bytes), next),
                        Err(e) => (Err(std::io::Error::other(e)), None),
                    }
                }
                Err(e) => {
                    warn!(user_id = %user_id, page, error = %e, "item stream aborted");
                    (Err(std::io::Error::other(e.to_string())), None)
                }
            };
            Some(chunk)
        }
    });

    ([(CONTENT_TYPE, NDJSON_CONTENT_TYPE)], Body::from_stream(pages)).into_response()
}
