//! The node store interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::node::{Node, User};

/// Durable storage for node metadata and the user identity registry.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Get a user by account name, assigning a new internal ID if the user
    /// has not been seen before. Idempotent, including under concurrent
    /// first-sight.
    async fn get_user(&self, account_name: &str) -> Result<User>;

    /// Store a node. Insert-only; storing a node with an existing ID fails
    /// with [`NodeStoreError::DuplicateId`](crate::NodeStoreError). Users in
    /// the node must have been materialized through [`get_user`](Self::get_user).
    async fn store_node(&self, node: &Node) -> Result<()>;

    /// Get a node. Fails with [`NodeStoreError::NoNode`](crate::NodeStoreError)
    /// if it does not exist.
    async fn get_node(&self, id: Uuid) -> Result<Node>;

    /// Delete a node. Fails with [`NodeStoreError::NoNode`](crate::NodeStoreError)
    /// if it does not exist.
    async fn delete_node(&self, id: Uuid) -> Result<()>;

    /// Set whether a node can be read by anyone, including anonymous users.
    async fn set_node_public(&self, id: Uuid, public: bool) -> Result<()>;

    /// Add a user to a node's read ACL. No effect if the user is the node's
    /// owner or already present.
    async fn add_reader(&self, id: Uuid, user: &User) -> Result<()>;

    /// Remove a user from a node's read ACL. No effect if the user is not
    /// present.
    async fn remove_reader(&self, id: Uuid, user: &User) -> Result<()>;

    /// Change the owner of a node. The new owner is removed from the read
    /// ACL in the same update; setting the current owner is a no-op.
    async fn change_owner(&self, id: Uuid, user: &User) -> Result<()>;
}
