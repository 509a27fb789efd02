//! Route handlers for the Shock-compatible surface.

pub mod acl;
pub mod copy_node;
pub mod create_node;
pub mod delete_node;
pub mod get_node;
pub mod root;

use axum::http::StatusCode;
use axum::response::Response;
use nodestore::User;
use uuid::Uuid;

use super::auth::Caller;
use super::envelope;

/// Fallback for unknown paths.
pub async fn not_found_handler() -> Response {
    envelope::error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Fallback for known paths with the wrong method.
pub async fn not_allowed_handler() -> Response {
    envelope::error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Require an authenticated caller. Shock compatibility on the message.
pub(crate) fn require_user(caller: &Caller) -> Result<&User, Response> {
    caller
        .user
        .as_ref()
        .ok_or_else(|| envelope::error_response(StatusCode::UNAUTHORIZED, "No Authorization"))
}

/// Parse a node ID path segment. A malformed UUID reads as a missing node,
/// compatible with Shock.
pub(crate) fn parse_node_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id)
        .map_err(|_| envelope::error_response(StatusCode::NOT_FOUND, "Node not found"))
}
