//! Reflection: lists the methods this server answers.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use keeper_core::rpc::{NDJSON_CONTENT_TYPE, methods};

/// `Reflection/ListMethods`: one method name per line.
pub async fn list_methods_handler() -> Response {
    let names = methods::UNARY
        .iter()
        .chain(methods::STREAMING)
        .map(|m| Ok::<_, Infallible>(Bytes::from(format!("{m}\n"))));
    (
        [(CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(stream::iter(names)),
    )
        .into_response()
}
