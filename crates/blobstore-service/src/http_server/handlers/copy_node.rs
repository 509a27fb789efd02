use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;

use super::super::auth::Caller;
use super::super::envelope;
use super::{parse_node_id, require_user};
use crate::state::AppState;

/// Copy a readable node into a fresh node owned by the caller.
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
    match state.store.copy_node(user, id).await {
        Ok(node) => envelope::data_response(envelope::node_json(&node)),
        Err(e) => envelope::store_error_response(e),
    }
}
