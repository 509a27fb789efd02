//! Node creation: raw request body or multipart form.
//!
//! The multipart form accepts an optional `format` part followed by exactly
//! one of `copy_data` (a node UUID to copy) or `upload` (the blob bytes,
//! which must carry a per-part Content-Length header). The raw-body path
//! takes `filename` and `format` from query parameters and the size from the
//! request Content-Length.

use std::collections::HashMap;

use axum::extract::multipart::{Field, Multipart};
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::Extension;
use futures::{StreamExt, TryStreamExt};
use nodestore::User;
use uuid::Uuid;

use super::super::auth::Caller;
use super::super::envelope;
use super::require_user;
use crate::state::AppState;

const FORM_FORMAT: &str = "format";
const FORM_COPY_DATA: &str = "copy_data";
const FORM_UPLOAD: &str = "upload";

/// Longest accepted file format value, in bytes.
const MAX_FORMAT_LEN: usize = 100;
/// Longest accepted file name, in bytes.
const MAX_FILENAME_LEN: usize = 256;
/// Read window for the copy_data part. A UUID is 36 ASCII chars; the slack
/// makes over-long submissions fail parsing instead of being silently cut.
const COPY_DATA_WINDOW: usize = 40;

pub async fn handler(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    Extension(caller): Extension<Caller>,
    request: Request,
) -> Response {
    let user = match require_user(&caller) {
        Ok(user) => user.clone(),
        Err(response) => return response,
    };

    let content_type = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("multipart/form-data") {
        if method == Method::PUT {
            return envelope::error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }
        let multipart = match Multipart::from_request(request, &state).await {
            Ok(multipart) => multipart,
            Err(e) => return envelope::error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        };
        create_from_form(&state, &user, multipart).await
    } else {
        create_from_body(&state, &user, &query, request).await
    }
}

async fn create_from_body(
    state: &AppState,
    user: &User,
    query: &HashMap<String, String>,
    request: Request,
) -> Response {
    let Some(size) = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    else {
        return envelope::error_response(StatusCode::LENGTH_REQUIRED, "Length Required");
    };

    let filename = match checked_value(query.get("filename"), MAX_FILENAME_LEN, "filename") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let format = match checked_value(query.get("format"), MAX_FORMAT_LEN, "format") {
        Ok(value) => value,
        Err(response) => return response,
    };

    let stream = request
        .into_body()
        .into_data_stream()
        .map_err(std::io::Error::other)
        .boxed();

    match state.store.store(user, stream, size, &filename, &format).await {
        Ok(node) => envelope::data_response(envelope::node_json(&node)),
        Err(e) => envelope::store_error_response(e),
    }
}

async fn create_from_form(state: &AppState, user: &User, mut multipart: Multipart) -> Response {
    let field = match next_part(&mut multipart).await {
        Ok(field) => field,
        Err(response) => return response,
    };
    let name = field.name().unwrap_or("").to_string();

    let (format, mut field, name) = if name == FORM_FORMAT {
        let mut field = field;
        let value = match part_string(&mut field, MAX_FORMAT_LEN + 1).await {
            Ok(value) => value,
            Err(response) => return response,
        };
        if value.len() > MAX_FORMAT_LEN {
            return envelope::error_response(
                StatusCode::BAD_REQUEST,
                &format!("format exceeds {} bytes", MAX_FORMAT_LEN),
            );
        }
        drop(field);
        let next = match next_part(&mut multipart).await {
            Ok(field) => field,
            Err(response) => return response,
        };
        let next_name = next.name().unwrap_or("").to_string();
        (value.trim().to_string(), next, next_name)
    } else {
        (String::new(), field, name)
    };

    match name.as_str() {
        FORM_COPY_DATA => {
            let value = match part_string(&mut field, COPY_DATA_WINDOW).await {
                Ok(value) => value,
                Err(response) => return response,
            };
            let src = match Uuid::parse_str(value.trim()) {
                Ok(src) => src,
                Err(e) => {
                    return envelope::error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("Invalid {}: {}", FORM_COPY_DATA, e),
                    )
                }
            };
            match state.store.copy_node(user, src).await {
                Ok(node) => envelope::data_response(envelope::node_json(&node)),
                Err(e) => envelope::store_error_response(e),
            }
        }
        FORM_UPLOAD => {
            let Some(size) = field
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
            else {
                return envelope::error_response(
                    StatusCode::BAD_REQUEST,
                    "Valid Content-Length header >= 0 required for upload form part",
                );
            };
            let filename = field.file_name().unwrap_or("").trim().to_string();
            if filename.len() > MAX_FILENAME_LEN {
                return envelope::error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("filename exceeds {} bytes", MAX_FILENAME_LEN),
                );
            }
            let data = match field.bytes().await {
                Ok(data) => data,
                Err(e) => return envelope::error_response(StatusCode::BAD_REQUEST, &e.to_string()),
            };
            let stream = futures::stream::iter(vec![Ok(data)]).boxed();
            match state.store.store(user, stream, size, &filename, &format).await {
                Ok(node) => envelope::data_response(envelope::node_json(&node)),
                Err(e) => envelope::store_error_response(e),
            }
        }
        other => envelope::error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unexpected form name: {}", other),
        ),
    }
}

async fn next_part<'a>(multipart: &'a mut Multipart) -> Result<Field<'a>, Response> {
    match multipart.next_field().await {
        Ok(Some(field)) => Ok(field),
        Ok(None) => Err(envelope::error_response(
            StatusCode::BAD_REQUEST,
            "Expected form part, early EOF",
        )),
        Err(e) => Err(envelope::error_response(
            StatusCode::BAD_REQUEST,
            &e.to_string(),
        )),
    }
}

/// Read a form part as text, up to `window` bytes. Longer parts are left
/// unread past the window so callers see an over-long value and reject it.
async fn part_string(field: &mut Field<'_>, window: usize) -> Result<String, Response> {
    let mut buffer = Vec::new();
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                buffer.extend_from_slice(&chunk);
                if buffer.len() > window {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err(envelope::error_response(
                    StatusCode::BAD_REQUEST,
                    &e.to_string(),
                ))
            }
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn checked_value(
    value: Option<&String>,
    max_len: usize,
    what: &str,
) -> Result<String, Response> {
    let value = value.map(|v| v.trim()).unwrap_or("");
    if value.len() > max_len {
        return Err(envelope::error_response(
            StatusCode::BAD_REQUEST,
            &format!("{} exceeds {} bytes", what, max_len),
        ));
    }
    Ok(value.to_string())
}
