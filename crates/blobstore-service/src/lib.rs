// Service modules (HTTP adapter over the coordinator)
pub mod config;
pub mod http_server;
pub mod state;

// Re-exports for the binary and tests
pub use config::Config;
pub use state::{AppState, ServerInfo};
