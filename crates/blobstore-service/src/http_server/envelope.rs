//! The Shock response envelope and error translation.
//!
//! Every JSON response is `{"status": s, "error": null|["msg"], "data": ...}`
//! with exactly one of `error`/`data` non-null. Selected error strings are
//! preserved verbatim for Shock client compatibility.

use authcache::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use blobstore_core::BlobStoreError;
use nodestore::{Node, User};
use serde_json::{json, Value};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Shock timestamp pattern: YYYY-MM-DDTHH:MM:SS.sssZ, always UTC.
const TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

pub fn format_time(t: OffsetDateTime) -> String {
    t.to_offset(time::UtcOffset::UTC)
        .format(TIME_FORMAT)
        .unwrap_or_default()
}

/// A successful enveloped response.
pub fn data_response(data: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": 200, "error": null, "data": data })),
    )
        .into_response()
}

/// An enveloped error response.
pub fn error_response(code: StatusCode, message: &str) -> Response {
    tracing::error!(status = code.as_u16(), "{}", message);
    (
        code,
        Json(json!({ "status": code.as_u16(), "error": [message], "data": null })),
    )
        .into_response()
}

/// Translate a coordinator error into its enveloped HTTP form.
pub fn store_error_response(err: BlobStoreError) -> Response {
    let (code, message) = match &err {
        BlobStoreError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        BlobStoreError::Unauthorized => (StatusCode::FORBIDDEN, "Unauthorized".to_string()),
        // compatible with Shock
        BlobStoreError::NoNode(_) => (StatusCode::NOT_FOUND, "Node not found".to_string()),
        BlobStoreError::NoBlob(_) => (StatusCode::NOT_FOUND, "Blob not found".to_string()),
        BlobStoreError::ContentLengthMismatch { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        BlobStoreError::DuplicateId(_) | BlobStoreError::Transient(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    };
    error_response(code, &message)
}

/// Translate a coordinator error on a path that permits anonymous callers.
/// A failed authorization is 401 when no credentials were presented (auth
/// required) and 403 when they were (auth present, insufficient).
pub fn read_error_response(err: BlobStoreError, authenticated: bool) -> Response {
    if !authenticated && matches!(err, BlobStoreError::Unauthorized) {
        return error_response(StatusCode::UNAUTHORIZED, "No Authorization");
    }
    store_error_response(err)
}

/// Translate an auth error into its enveloped HTTP form.
pub fn auth_error_response(err: AuthError) -> Response {
    let (code, message) = match &err {
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
        AuthError::InvalidUserName(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        AuthError::Provider(_) | AuthError::NodeStore(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    };
    error_response(code, &message)
}

/// The node metadata shape served by `GET /node/{id}`.
pub fn node_json(node: &Node) -> Value {
    json!({
        "id": node.id().to_string(),
        "format": node.format(),
        "attributes": null, // deprecated
        "created_on": format_time(node.stored()),
        "last_modified": format_time(node.stored()),
        "file": {
            "name": node.filename(),
            "size": node.size(),
            "checksum": { "md5": node.md5() },
        },
    })
}

/// The ACL shape served by `GET /node/{id}/acl`. The write and delete lists
/// always equal the owner set.
pub fn acl_json(node: &Node, verbose: bool) -> Value {
    let owner = user_json(node.owner(), verbose);
    let readers: Vec<Value> = node
        .readers()
        .iter()
        .map(|u| user_json(u, verbose))
        .collect();
    json!({
        "owner": owner.clone(),
        "delete": [owner.clone()],
        "write": [owner],
        "read": readers,
        "public": {
            "write": false,
            "delete": false,
            "read": node.public(),
        },
    })
}

fn user_json(user: &User, verbose: bool) -> Value {
    if verbose {
        json!({
            "uuid": user.id().to_string(),
            "username": user.account_name(),
        })
    } else {
        json!(user.id().to_string())
    }
}
