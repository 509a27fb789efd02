//! Node metadata and download.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;

use super::super::auth::Caller;
use super::super::envelope;
use super::parse_node_id;
use crate::state::AppState;

pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    let id = match parse_node_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let user = caller.user.as_ref();

    // ?download sets a content-disposition; ?download_raw streams bare bytes
    let download = if query.contains_key("download") {
        Some(true)
    } else if query.contains_key("download_raw") {
        Some(false)
    } else {
        None
    };

    let Some(with_disposition) = download else {
        return match state.store.get(user, id).await {
            Ok(node) => envelope::data_response(envelope::node_json(&node)),
            Err(e) => envelope::read_error_response(e, user.is_some()),
        };
    };

    match state.store.get_file(user, id, 0, None).await {
        Ok((stream, size, filename)) => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_LENGTH, size)
                .header(CONTENT_TYPE, "application/octet-stream");
            if with_disposition {
                let filename = if filename.is_empty() {
                    id.to_string()
                } else {
                    filename
                };
                builder = builder.header(
                    CONTENT_DISPOSITION,
                    format!("attachment; filename={}", filename),
                );
            }
            builder
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => envelope::read_error_response(e, user.is_some()),
    }
}
