//! Error types for the node store.

use uuid::Uuid;

/// Errors that can occur when working with node metadata.
#[derive(Debug, thiserror::Error)]
pub enum NodeStoreError {
    /// The node does not exist.
    #[error("node {0} does not exist")]
    NoNode(Uuid),

    /// A node with this ID has already been stored.
    #[error("node {0} already exists")]
    DuplicateId(Uuid),

    /// A precondition on the input was violated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing database failed.
    #[error("node storage error: {0}")]
    Database(String),
}

impl From<mongodb::error::Error> for NodeStoreError {
    fn from(e: mongodb::error::Error) -> Self {
        NodeStoreError::Database(e.to_string())
    }
}

impl From<bson::ser::Error> for NodeStoreError {
    fn from(e: bson::ser::Error) -> Self {
        NodeStoreError::Database(e.to_string())
    }
}

/// Result type alias for node store operations.
pub type Result<T> = std::result::Result<T, NodeStoreError>;
