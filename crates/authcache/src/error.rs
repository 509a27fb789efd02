//! Error types for authentication.

/// Errors that can occur validating tokens or usernames.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token was rejected by the auth provider.
    #[error("Invalid token")]
    InvalidToken,

    /// One or more account names are not valid accounts.
    #[error("Invalid users: {}", .0.join(", "))]
    InvalidUserName(Vec<String>),

    /// The auth provider failed or returned an unexpected response.
    #[error("auth provider error: {0}")]
    Provider(String),

    /// Materializing the user in the node store failed.
    #[error("node storage error: {0}")]
    NodeStore(String),
}

impl From<nodestore::NodeStoreError> for AuthError {
    fn from(e: nodestore::NodeStoreError) -> Self {
        AuthError::NodeStore(e.to_string())
    }
}

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
