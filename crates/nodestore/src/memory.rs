//! In-memory node store, used as a test fixture.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{NodeStoreError, Result};
use crate::node::{Node, User};
use crate::store::NodeStore;

/// In-memory node store using HashMaps. Implements the full trait semantics
/// so coordinator and router tests can run without MongoDB.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    inner: Arc<RwLock<MemoryNodeStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryNodeStoreInner {
    /// account name -> internal ID
    users: HashMap<String, Uuid>,
    nodes: HashMap<Uuid, NodeRecord>,
}

#[derive(Debug, Clone)]
struct NodeRecord {
    owner: User,
    readers: Vec<User>,
    filename: String,
    format: String,
    size: u64,
    md5: String,
    stored: OffsetDateTime,
    public: bool,
}

impl NodeRecord {
    fn to_node(&self, id: Uuid) -> Result<Node> {
        let mut builder = Node::builder(id, self.owner.clone(), self.size, &self.md5, self.stored)
            .filename(&self.filename)
            .format(&self.format)
            .public(self.public);
        for reader in &self.readers {
            builder = builder.reader(reader.clone());
        }
        builder.build()
    }
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryNodeStoreInner>> {
        self.inner
            .read()
            .map_err(|e| NodeStoreError::Database(format!("failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryNodeStoreInner>> {
        self.inner
            .write()
            .map_err(|e| NodeStoreError::Database(format!("failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn get_user(&self, account_name: &str) -> Result<User> {
        let candidate = User::new(Uuid::new_v4(), account_name)?;
        let mut inner = self.write()?;
        let id = *inner
            .users
            .entry(candidate.account_name().to_string())
            .or_insert_with(|| candidate.id());
        User::new(id, candidate.account_name())
    }

    async fn store_node(&self, node: &Node) -> Result<()> {
        let mut inner = self.write()?;
        if inner.nodes.contains_key(&node.id()) {
            return Err(NodeStoreError::DuplicateId(node.id()));
        }
        inner.nodes.insert(
            node.id(),
            NodeRecord {
                owner: node.owner().clone(),
                readers: node.readers().to_vec(),
                filename: node.filename().to_string(),
                format: node.format().to_string(),
                size: node.size(),
                md5: node.md5().to_string(),
                stored: node.stored(),
                public: node.public(),
            },
        );
        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> Result<Node> {
        let inner = self.read()?;
        let record = inner.nodes.get(&id).ok_or(NodeStoreError::NoNode(id))?;
        record.to_node(id)
    }

    async fn delete_node(&self, id: Uuid) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .nodes
            .remove(&id)
            .map(|_| ())
            .ok_or(NodeStoreError::NoNode(id))
    }

    async fn set_node_public(&self, id: Uuid, public: bool) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner.nodes.get_mut(&id).ok_or(NodeStoreError::NoNode(id))?;
        record.public = public;
        Ok(())
    }

    async fn add_reader(&self, id: Uuid, user: &User) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner.nodes.get_mut(&id).ok_or(NodeStoreError::NoNode(id))?;
        if &record.owner != user && !record.readers.contains(user) {
            record.readers.push(user.clone());
        }
        Ok(())
    }

    async fn remove_reader(&self, id: Uuid, user: &User) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner.nodes.get_mut(&id).ok_or(NodeStoreError::NoNode(id))?;
        record.readers.retain(|r| r != user);
        Ok(())
    }

    async fn change_owner(&self, id: Uuid, user: &User) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner.nodes.get_mut(&id).ok_or(NodeStoreError::NoNode(id))?;
        record.readers.retain(|r| r != user);
        record.owner = user.clone();
        Ok(())
    }
}
