use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde_json::json;

use super::super::auth::Caller;
use super::super::envelope;
use super::{parse_node_id, require_user};
use crate::state::AppState;

/// Owner-only node deletion.
pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Response {
    let id = match parse_node_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let user = match require_user(&caller) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match state.store.delete_node(user, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": 200, "error": null, "data": null })),
        )
            .into_response(),
        Err(e) => envelope::store_error_response(e),
    }
}
