//! Error types for the file store.

/// Errors that can occur when working with blob storage.
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error from the caller-supplied byte stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the service.")]
    BucketNotFound(String),

    /// Invalid store parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Blob not found
    #[error("no blob found for id: {0}")]
    NoBlob(String),

    /// The byte stream did not match the declared size
    #[error("content length mismatch: expected {expected} bytes, got {actual}")]
    ContentLengthMismatch { expected: u64, actual: u64 },
}

/// Result type alias for file store operations.
pub type Result<T> = std::result::Result<T, FileStoreError>;
