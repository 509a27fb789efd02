//! ACL reads and mutations.
//!
//! Readable ACL types include the vestigial `write`/`delete`/`public_write`/
//! `public_delete`, which render from the owner set and constant flags;
//! mutation is only supported for `read`, `public_read` and `owner`.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Extension;

use super::super::auth::Caller;
use super::super::envelope;
use super::{parse_node_id, require_user};
use crate::state::AppState;

const INVALID_ACL_TYPE: &str = "Invalid acl type";
const NO_USERS: &str = "Action requires list of comma separated usernames in 'users' parameter";
const TOO_MANY_USERS: &str = "Too many users. Nodes may have only one owner.";

const ACL_TYPES: &[&str] = &[
    "",
    "owner",
    "read",
    "write",
    "delete",
    "public_read",
    "public_write",
    "public_delete",
];

fn verbose(query: &HashMap<String, String>) -> bool {
    query.get("verbosity").map(String::as_str) == Some("full")
}

pub async fn get_root(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    read_acl(&state, &caller, &id, "", &query).await
}

pub async fn get_typed(
    State(state): State<AppState>,
    Path((id, acl_type)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    read_acl(&state, &caller, &id, &acl_type, &query).await
}

async fn read_acl(
    state: &AppState,
    caller: &Caller,
    id: &str,
    acl_type: &str,
    query: &HashMap<String, String>,
) -> Response {
    if !ACL_TYPES.contains(&acl_type) {
        // compatible with Shock
        return envelope::error_response(StatusCode::BAD_REQUEST, INVALID_ACL_TYPE);
    }
    let id = match parse_node_id(id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.store.get(caller.user.as_ref(), id).await {
        Ok(node) => envelope::data_response(envelope::acl_json(&node, verbose(query))),
        Err(e) => envelope::read_error_response(e, caller.user.is_some()),
    }
}

pub async fn put_handler(
    State(state): State<AppState>,
    Path((id, acl_type)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    mutate_acl(&state, &caller, &id, &acl_type, &query, true).await
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Path((id, acl_type)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    mutate_acl(&state, &caller, &id, &acl_type, &query, false).await
}

async fn mutate_acl(
    state: &AppState,
    caller: &Caller,
    id: &str,
    acl_type: &str,
    query: &HashMap<String, String>,
    add: bool,
) -> Response {
    if !ACL_TYPES.contains(&acl_type) {
        return envelope::error_response(StatusCode::BAD_REQUEST, INVALID_ACL_TYPE);
    }
    let id = match parse_node_id(id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let user = match require_user(caller) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let node = match acl_type {
        "public_read" => match state.store.set_node_public(user, id, add).await {
            Ok(node) => node,
            Err(e) => return envelope::store_error_response(e),
        },
        "read" => {
            let users = match user_list(state, caller, query, false).await {
                Ok(users) => users,
                Err(response) => return response,
            };
            let result = if add {
                state.store.add_readers(user, id, &users).await
            } else {
                state.store.remove_readers(user, id, &users).await
            };
            match result {
                Ok(node) => node,
                Err(e) => return envelope::store_error_response(e),
            }
        }
        "owner" => {
            if !add {
                return envelope::error_response(
                    StatusCode::BAD_REQUEST,
                    "Deleting ownership is not a supported request type.",
                );
            }
            let users = match user_list(state, caller, query, true).await {
                Ok(users) => users,
                Err(response) => return response,
            };
            match state.store.change_owner(user, id, &users[0]).await {
                Ok(node) => node,
                Err(e) => return envelope::store_error_response(e),
            }
        }
        // write/delete ACLs and their public flags are vestigial - readable,
        // never mutable
        _ => return envelope::error_response(StatusCode::BAD_REQUEST, INVALID_ACL_TYPE),
    };

    envelope::data_response(envelope::acl_json(&node, verbose(query)))
}

/// Parse and pre-validate the `users` query parameter.
async fn user_list(
    state: &AppState,
    caller: &Caller,
    query: &HashMap<String, String>,
    single_user: bool,
) -> Result<Vec<String>, Response> {
    let raw = query.get("users").map(String::as_str).unwrap_or("");
    let users: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if users.is_empty() {
        return Err(envelope::error_response(StatusCode::BAD_REQUEST, NO_USERS));
    }
    if single_user && users.len() > 1 {
        return Err(envelope::error_response(
            StatusCode::BAD_REQUEST,
            TOO_MANY_USERS,
        ));
    }
    let token = caller.token.as_deref().unwrap_or("");
    if let Err(e) = state.auth.validate_user_names(&users, token).await {
        return Err(envelope::auth_error_response(e));
    }
    Ok(users)
}
