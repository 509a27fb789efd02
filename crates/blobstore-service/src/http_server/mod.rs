use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod auth;
pub mod envelope;
pub mod handlers;

use crate::state::AppState;

/// Maximum upload size in bytes (500 MB)
pub const MAX_UPLOAD_SIZE_BYTES: usize = 500 * 1024 * 1024;

/// Build the Shock-compatible router. Every route also matches with a
/// trailing slash; unknown paths and disallowed methods get enveloped
/// errors.
pub fn router(state: AppState) -> Router {
    let create = post(handlers::create_node::handler)
        .put(handlers::create_node::handler)
        .fallback(handlers::not_allowed_handler);
    let node = get(handlers::get_node::handler)
        .delete(handlers::delete_node::handler)
        .fallback(handlers::not_allowed_handler);
    let copy = post(handlers::copy_node::handler).fallback(handlers::not_allowed_handler);
    let acl_root = get(handlers::acl::get_root).fallback(handlers::not_allowed_handler);
    let acl = get(handlers::acl::get_typed)
        .put(handlers::acl::put_handler)
        .delete(handlers::acl::delete_handler)
        .fallback(handlers::not_allowed_handler);

    Router::new()
        .route(
            "/",
            get(handlers::root::handler).fallback(handlers::not_allowed_handler),
        )
        .route("/node", create.clone())
        .route("/node/", create)
        .route("/node/:id", node.clone())
        .route("/node/:id/", node)
        .route("/node/:id/copy", copy.clone())
        .route("/node/:id/copy/", copy)
        .route("/node/:id/acl", acl_root.clone())
        .route("/node/:id/acl/", acl_root)
        .route("/node/:id/acl/:acltype", acl.clone())
        .route("/node/:id/acl/:acltype/", acl)
        .fallback(handlers::not_found_handler)
        .layer(middleware::from_fn_with_state(state.clone(), auth::middleware))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE_BYTES))
        .with_state(state)
}

/// Run the HTTP server until the shutdown channel fires.
pub async fn run(
    listen_addr: SocketAddr,
    state: AppState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let router = router(state).layer(trace_layer);

    tracing::info!(addr = ?listen_addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    })
    .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
