//! Shared service state handed to every handler.

use std::sync::Arc;

use authcache::AuthCache;
use blobstore_core::BlobStore;

/// Static identification fields reported by the root endpoint. The `id` and
/// `compat_version` fields exist for Shock compatibility and are deprecated.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub server_name: String,
    pub server_version: String,
    pub id: String,
    pub compat_version: String,
    pub deprecation_warning: String,
    pub git_commit: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            server_name: "BlobStore".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            id: "Shock".to_string(),
            compat_version: "0.9.6".to_string(),
            deprecation_warning:
                "Please note the id and version fields are deprecated.".to_string(),
            git_commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        }
    }
}

/// State shared across the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub store: BlobStore,
    pub auth: Arc<AuthCache>,
    pub info: ServerInfo,
    pub dont_trust_x_ip_headers: bool,
}

impl AppState {
    pub fn new(store: BlobStore, auth: Arc<AuthCache>, info: ServerInfo) -> Self {
        Self {
            store,
            auth,
            info,
            dont_trust_x_ip_headers: false,
        }
    }

    pub fn with_dont_trust_x_ip_headers(mut self, value: bool) -> Self {
        self.dont_trust_x_ip_headers = value;
        self
    }
}
