//! Per-request authentication and logging middleware.
//!
//! Extracts the `Authorization: OAuth <token>` header (scheme
//! case-insensitive), resolves the caller through the auth cache, and hands
//! both the user and the raw token to handlers via a [`Caller`] extension.
//! An absent header is an anonymous caller; a malformed one is a 400.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use nodestore::User;
use rand::Rng;
use tracing::Instrument;

use super::envelope;
use crate::state::AppState;

const INVALID_AUTH_HEADER: &str = "Invalid authorization header or content";

/// The resolved caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: Option<User>,
    pub token: Option<String>,
}

fn token_from_header(headers: &HeaderMap) -> Result<Option<String>, ()> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ())?;
    if value.trim().is_empty() {
        return Ok(None);
    }
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("oauth") {
        return Err(());
    }
    Ok(Some(parts[1].to_string()))
}

/// Resolve the client IP: first X-Forwarded-For entry, else X-Real-IP, else
/// the peer address. The proxy headers are skipped entirely when the service
/// is configured not to trust them.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, ignore_x_headers: bool) -> String {
    let peer = peer.map(|addr| addr.to_string()).unwrap_or_default();
    if ignore_x_headers {
        return peer;
    }
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let forwarded = forwarded.split(',').next().unwrap_or("").trim();
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim();
    if !forwarded.is_empty() {
        forwarded.to_string()
    } else if !real_ip.is_empty() {
        real_ip.to_string()
    } else {
        peer
    }
}

pub async fn middleware(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = format!(
        "{:016}",
        rand::thread_rng().gen_range(0..10_000_000_000_000_000u64)
    );
    let ip = client_ip(
        request.headers(),
        connect_info.map(|ConnectInfo(addr)| addr),
        state.dont_trust_x_ip_headers,
    );
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let token = match token_from_header(request.headers()) {
        Ok(token) => token,
        Err(()) => return envelope::error_response(StatusCode::BAD_REQUEST, INVALID_AUTH_HEADER),
    };

    let user = match &token {
        Some(token) => match state.auth.get_user(token).await {
            Ok(user) => Some(user),
            Err(e) => return envelope::auth_error_response(e),
        },
        None => None,
    };

    let user_name = user
        .as_ref()
        .map(|u| u.account_name().to_string())
        .unwrap_or_default();
    let span = tracing::info_span!(
        "request",
        requestid = %request_id,
        service = "BlobStore",
        method = %method,
        path = %path,
        ip = %ip,
        user = %user_name,
    );

    request.extensions_mut().insert(Caller { user, token });
    let response = next.run(request).instrument(span.clone()).await;
    if response.status().as_u16() < 400 {
        // errors were already logged where they were written
        span.in_scope(|| tracing::info!(status = response.status().as_u16(), "request complete"));
    }
    response
}
