use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use authcache::{AuthCache, AuthCacheConfig, HttpAuthProvider};
use blobstore_core::BlobStore;
use clap::Parser;
use filestore::{ObjectStoreConfig, S3FileStore};
use nodestore::MongoNodeStore;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use blobstore_service::{http_server, AppState, Config, ServerInfo};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = config.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    tracing::info!("Starting blob store service");
    if !config.auth_url_is_secure() {
        tracing::warn!(url = %config.auth_url, "Insecure auth url");
    }

    let filestore = Arc::new(
        S3FileStore::new(ObjectStoreConfig::S3 {
            endpoint: config.s3_endpoint.clone(),
            access_key: config.s3_access_key.clone(),
            secret_key: config.s3_secret_key.clone(),
            bucket: config.s3_bucket.clone(),
            region: config.s3_region.clone(),
        })
        .await?,
    );
    let nodestore = Arc::new(MongoNodeStore::new(&config.mongodb_uri, &config.mongodb_db).await?);

    let provider = Arc::new(HttpAuthProvider::new(&config.auth_url));
    let auth = Arc::new(AuthCache::new(
        provider,
        nodestore.clone(),
        AuthCacheConfig {
            token_cache_size: config.token_cache_size,
            token_ttl: Duration::from_secs(config.token_cache_ttl_seconds),
            name_cache_size: config.username_cache_size,
            name_ttl: Duration::from_secs(config.username_cache_ttl_seconds),
        },
    ));

    let store = BlobStore::new(filestore, nodestore);
    let state = AppState::new(store, auth, ServerInfo::default())
        .with_dont_trust_x_ip_headers(config.dont_trust_x_ip_headers);

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    http_server::run(config.listen, state, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
