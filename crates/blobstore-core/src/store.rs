//! The coordinator: node-level operations over the file and node stores.

use std::sync::Arc;

use filestore::{ByteStream, FileStore, StoreFileParams};
use nodestore::{Node, NodeStore, User};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BlobStoreError, Result};

/// Coordinates blob bytes, node metadata, and authorization.
///
/// Stateless apart from its store references; safe for concurrent use.
#[derive(Clone)]
pub struct BlobStore {
    filestore: Arc<dyn FileStore>,
    nodestore: Arc<dyn NodeStore>,
}

impl BlobStore {
    pub fn new(filestore: Arc<dyn FileStore>, nodestore: Arc<dyn NodeStore>) -> Self {
        Self {
            filestore,
            nodestore,
        }
    }

    /// Ingest a blob and record its node. The caller must be authenticated.
    ///
    /// Bytes are streamed into the file store first; the node is recorded
    /// only after the upload completes, so a visible node always has
    /// retrievable bytes. A failed metadata write triggers a best-effort
    /// delete of the just-written blob.
    pub async fn store(
        &self,
        user: &User,
        data: ByteStream,
        size: u64,
        filename: &str,
        format: &str,
    ) -> Result<Node> {
        if size < 1 {
            return Err(BlobStoreError::InvalidInput("size must be > 0".into()));
        }
        let id = Uuid::new_v4();

        let params = StoreFileParams::new(&id.to_string(), size, data)?
            .with_filename(filename)
            .with_format(format);
        let info = self.filestore.store_file(params).await?;

        let node = Node::builder(id, user.clone(), info.size, &info.md5, info.stored)
            .filename(&info.filename)
            .format(&info.format)
            .build()?;

        if let Err(e) = self.nodestore.store_node(&node).await {
            self.cleanup_blob(id).await;
            return Err(e.into());
        }
        debug!(node = %id, size = info.size, user = user.account_name(), "node stored");
        Ok(node)
    }

    /// Copy a readable node into a fresh node owned by the caller. The blob
    /// is copied server-side; none of the source ACL carries over.
    pub async fn copy_node(&self, user: &User, src: Uuid) -> Result<Node> {
        let source = self.nodestore.get_node(src).await?;
        authorize_read(Some(user), &source)?;

        let dst = Uuid::new_v4();
        self.filestore
            .copy_file(&src.to_string(), &dst.to_string())
            .await?;

        let copy = Node::builder(
            dst,
            user.clone(),
            source.size(),
            source.md5(),
            OffsetDateTime::now_utc(),
        )
        .filename(source.filename())
        .format(source.format())
        .build()?;

        if let Err(e) = self.nodestore.store_node(&copy).await {
            self.cleanup_blob(dst).await;
            return Err(e.into());
        }
        debug!(node = %dst, source = %src, user = user.account_name(), "node copied");
        Ok(copy)
    }

    /// Get a node's metadata. Requires read permission; an anonymous caller
    /// may read public nodes only.
    pub async fn get(&self, user: Option<&User>, id: Uuid) -> Result<Node> {
        let node = self.nodestore.get_node(id).await?;
        authorize_read(user, &node)?;
        Ok(node)
    }

    /// Get a node's bytes as a stream, together with the node's size and
    /// filename. Requires read permission. The stream is the caller's to
    /// drain; `seek` past the end yields an empty stream.
    pub async fn get_file(
        &self,
        user: Option<&User>,
        id: Uuid,
        seek: u64,
        length: Option<u64>,
    ) -> Result<(ByteStream, u64, String)> {
        let node = self.nodestore.get_node(id).await?;
        authorize_read(user, &node)?;
        let stream = self.filestore.get_file(&id.to_string(), seek, length).await?;
        Ok((stream, node.size(), node.filename().to_string()))
    }

    /// Delete a node and its blob. Owner-only; neither readers nor the
    /// public flag grant delete.
    ///
    /// The blob is deleted before the metadata. If the metadata delete then
    /// fails, the node is left without bytes; retrying the delete converges.
    pub async fn delete_node(&self, user: &User, id: Uuid) -> Result<()> {
        let node = self.nodestore.get_node(id).await?;
        authorize_owner(user, &node)?;
        self.filestore.delete_file(&id.to_string()).await?;
        self.nodestore.delete_node(id).await?;
        debug!(node = %id, user = user.account_name(), "node deleted");
        Ok(())
    }

    /// Set a node's public-read flag. Owner-only. Returns the updated node.
    pub async fn set_node_public(&self, user: &User, id: Uuid, public: bool) -> Result<Node> {
        let node = self.nodestore.get_node(id).await?;
        authorize_owner(user, &node)?;
        self.nodestore.set_node_public(id, public).await?;
        Ok(self.nodestore.get_node(id).await?)
    }

    /// Add users to a node's read ACL by account name. Owner-only. Names
    /// equal to the owner or already present are skipped. Returns the
    /// updated node.
    pub async fn add_readers(
        &self,
        user: &User,
        id: Uuid,
        account_names: &[String],
    ) -> Result<Node> {
        let node = self.nodestore.get_node(id).await?;
        authorize_owner(user, &node)?;
        for name in account_names {
            let reader = self.nodestore.get_user(name).await?;
            self.nodestore.add_reader(id, &reader).await?;
        }
        Ok(self.nodestore.get_node(id).await?)
    }

    /// Remove users from a node's read ACL by account name. Owner-only and
    /// idempotent. Returns the updated node.
    pub async fn remove_readers(
        &self,
        user: &User,
        id: Uuid,
        account_names: &[String],
    ) -> Result<Node> {
        let node = self.nodestore.get_node(id).await?;
        authorize_owner(user, &node)?;
        for name in account_names {
            let reader = self.nodestore.get_user(name).await?;
            self.nodestore.remove_reader(id, &reader).await?;
        }
        Ok(self.nodestore.get_node(id).await?)
    }

    /// Transfer ownership to another account. Owner-only. The new owner is
    /// removed from the read ACL atomically with the owner change; handing
    /// the node to the current owner is a no-op. Returns the updated node.
    pub async fn change_owner(
        &self,
        user: &User,
        id: Uuid,
        new_account_name: &str,
    ) -> Result<Node> {
        let node = self.nodestore.get_node(id).await?;
        authorize_owner(user, &node)?;
        let new_owner = self.nodestore.get_user(new_account_name).await?;
        if &new_owner != node.owner() {
            self.nodestore.change_owner(id, &new_owner).await?;
        }
        Ok(self.nodestore.get_node(id).await?)
    }

    /// Best-effort removal of a blob whose metadata write failed. A failure
    /// here only produces an unreachable orphan, so it is logged, not raised.
    async fn cleanup_blob(&self, id: Uuid) {
        if let Err(e) = self.filestore.delete_file(&id.to_string()).await {
            warn!(node = %id, error = %e, "failed to clean up blob after metadata write failure");
        }
    }
}

fn authorize_read(user: Option<&User>, node: &Node) -> Result<()> {
    if node.public() {
        return Ok(());
    }
    match user {
        Some(u) if u == node.owner() || node.readers().contains(u) => Ok(()),
        _ => Err(BlobStoreError::Unauthorized),
    }
}

fn authorize_owner(user: &User, node: &Node) -> Result<()> {
    if user == node.owner() {
        Ok(())
    } else {
        Err(BlobStoreError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5: &str = "5d838d477ddf355fc15df1db90bee0aa";

    fn user(name: &str) -> User {
        User::new(Uuid::new_v4(), name).unwrap()
    }

    fn node(owner: &User, readers: &[&User], public: bool) -> Node {
        let mut builder = Node::builder(
            Uuid::new_v4(),
            owner.clone(),
            12,
            MD5,
            OffsetDateTime::now_utc(),
        )
        .public(public);
        for reader in readers {
            builder = builder.reader((*reader).clone());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_read_permission() {
        let alice = user("alice");
        let bob = user("bob");
        let carol = user("carol");

        let private = node(&alice, &[&bob], false);
        assert!(authorize_read(Some(&alice), &private).is_ok());
        assert!(authorize_read(Some(&bob), &private).is_ok());
        assert!(matches!(
            authorize_read(Some(&carol), &private),
            Err(BlobStoreError::Unauthorized)
        ));
        assert!(matches!(
            authorize_read(None, &private),
            Err(BlobStoreError::Unauthorized)
        ));

        let public = node(&alice, &[], true);
        assert!(authorize_read(Some(&carol), &public).is_ok());
        assert!(authorize_read(None, &public).is_ok());
    }

    #[test]
    fn test_owner_permission() {
        let alice = user("alice");
        let bob = user("bob");

        // neither readers nor the public flag grant owner permission
        let n = node(&alice, &[&bob], true);
        assert!(authorize_owner(&alice, &n).is_ok());
        assert!(matches!(
            authorize_owner(&bob, &n),
            Err(BlobStoreError::Unauthorized)
        ));
    }
}
