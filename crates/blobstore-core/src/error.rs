//! The coordinator's error taxonomy.
//!
//! Flat and total: every failure from the collaborating stores maps onto
//! exactly one kind, and kinds are never wrapped in each other. Only
//! `Transient` can leave partial effects behind.

use filestore::FileStoreError;
use nodestore::NodeStoreError;
use uuid::Uuid;

/// Errors returned by coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// A precondition on the input was violated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller does not have permission for the operation.
    #[error("Unauthorized")]
    Unauthorized,

    /// The node does not exist.
    #[error("node {0} does not exist")]
    NoNode(Uuid),

    /// The node exists but its blob is missing from the file store.
    #[error("no blob found for id: {0}")]
    NoBlob(String),

    /// A node with this ID has already been stored.
    #[error("node {0} already exists")]
    DuplicateId(Uuid),

    /// The upload byte stream did not match the declared size.
    #[error("content length mismatch: expected {expected} bytes, got {actual}")]
    ContentLengthMismatch { expected: u64, actual: u64 },

    /// An upstream I/O failure; state may be partially applied.
    #[error("transient error: {0}")]
    Transient(String),
}

impl From<FileStoreError> for BlobStoreError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::InvalidInput(msg) => BlobStoreError::InvalidInput(msg),
            FileStoreError::NoBlob(id) => BlobStoreError::NoBlob(id),
            FileStoreError::ContentLengthMismatch { expected, actual } => {
                BlobStoreError::ContentLengthMismatch { expected, actual }
            }
            FileStoreError::ObjectStore(_)
            | FileStoreError::Io(_)
            | FileStoreError::InvalidConfig(_)
            | FileStoreError::BucketNotFound(_) => BlobStoreError::Transient(e.to_string()),
        }
    }
}

impl From<NodeStoreError> for BlobStoreError {
    fn from(e: NodeStoreError) -> Self {
        match e {
            NodeStoreError::NoNode(id) => BlobStoreError::NoNode(id),
            NodeStoreError::DuplicateId(id) => BlobStoreError::DuplicateId(id),
            NodeStoreError::InvalidInput(msg) => BlobStoreError::InvalidInput(msg),
            NodeStoreError::Database(msg) => BlobStoreError::Transient(msg),
        }
    }
}

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, BlobStoreError>;
