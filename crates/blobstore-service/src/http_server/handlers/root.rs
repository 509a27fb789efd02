use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use time::OffsetDateTime;

use crate::state::AppState;

/// Service information. Not enveloped, for Shock compatibility.
pub async fn handler(State(state): State<AppState>) -> Response {
    let info = &state.info;
    let servertime = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    Json(json!({
        "servername": info.server_name,
        "serverversion": info.server_version,
        "id": info.id,
        "version": info.compat_version,
        "deprecationwarning": info.deprecation_warning,
        "servertime": servertime,
        "gitcommit": info.git_commit,
    }))
    .into_response()
}
