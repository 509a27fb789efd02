//! Configuration for the blob store service.
//!
//! CLI arguments and environment variable handling using clap.

use std::net::SocketAddr;

use clap::Parser;

/// Blob store service - Shock-compatible content-addressed file storage
#[derive(Parser, Debug, Clone)]
#[command(name = "blobstore")]
#[command(about = "Shock-compatible blob storage over S3 and MongoDB")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: String,

    /// S3 access key ID
    #[arg(long, env = "S3_ACCESS_KEY")]
    pub s3_access_key: String,

    /// S3 secret access key
    #[arg(long, env = "S3_SECRET_KEY")]
    pub s3_secret_key: String,

    /// S3 bucket for blob data
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: String,

    /// S3 region
    #[arg(long, env = "S3_REGION")]
    pub s3_region: Option<String>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "blobstore")]
    pub mongodb_db: String,

    /// Base URL of the external auth service
    #[arg(long, env = "AUTH_URL")]
    pub auth_url: String,

    /// Maximum number of cached token validations
    #[arg(long, env = "TOKEN_CACHE_SIZE", default_value = "1000")]
    pub token_cache_size: u64,

    /// Seconds a validated token stays cached
    #[arg(long, env = "TOKEN_CACHE_TTL_SECONDS", default_value = "300")]
    pub token_cache_ttl_seconds: u64,

    /// Maximum number of cached username checks
    #[arg(long, env = "USERNAME_CACHE_SIZE", default_value = "1000")]
    pub username_cache_size: u64,

    /// Seconds a validated username stays cached
    #[arg(long, env = "USERNAME_CACHE_TTL_SECONDS", default_value = "300")]
    pub username_cache_ttl_seconds: u64,

    /// Ignore X-Forwarded-For and X-Real-IP headers when resolving client IPs
    #[arg(long, env = "DONT_TRUST_X_IP_HEADERS", default_value = "false")]
    pub dont_trust_x_ip_headers: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.trim().is_empty() {
            return Err("S3_BUCKET cannot be empty".to_string());
        }
        if self.auth_url.trim().is_empty() {
            return Err("AUTH_URL cannot be empty".to_string());
        }
        Ok(())
    }

    /// Whether the auth service URL uses TLS. Plain-HTTP auth services leak
    /// tokens and get a startup warning.
    pub fn auth_url_is_secure(&self) -> bool {
        self.auth_url.starts_with("https://")
    }
}
