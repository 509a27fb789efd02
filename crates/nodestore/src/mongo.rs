//! MongoDB-backed node store.
//!
//! Two collections: `users` (unique index on the account name) and `nodes`
//! (keyed by the node UUID). ACL mutations are single-document atomic
//! updates, which is what makes concurrent reader changes and owner changes
//! per-node linearizable - contending writers are serialized by the server,
//! nothing is lost, and an owner change pulls the new owner out of the read
//! ACL in the same update.

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::{NodeStoreError, Result};
use crate::node::{Node, User};
use crate::store::NodeStore;

/// Collection name for users.
pub const USER_COLLECTION: &str = "users";
/// Collection name for nodes.
pub const NODE_COLLECTION: &str = "nodes";

/// User document stored in MongoDB.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct UserDoc {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    id: Uuid,
    account_name: String,
}

/// A user embedded in a node document (owner or reader).
#[derive(Serialize, Deserialize, Clone, Debug)]
struct UserRef {
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    id: Uuid,
    account_name: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            account_name: user.account_name().to_string(),
        }
    }
}

impl TryFrom<UserRef> for User {
    type Error = NodeStoreError;

    fn try_from(user: UserRef) -> Result<User> {
        User::new(user.id, &user.account_name)
    }
}

/// Node document stored in MongoDB.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct NodeDoc {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    id: Uuid,
    owner: UserRef,
    readers: Vec<UserRef>,
    filename: String,
    format: String,
    size: i64,
    md5: String,
    stored: bson::DateTime,
    public: bool,
}

impl From<&Node> for NodeDoc {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id(),
            owner: node.owner().into(),
            readers: node.readers().iter().map(UserRef::from).collect(),
            filename: node.filename().to_string(),
            format: node.format().to_string(),
            size: node.size() as i64,
            md5: node.md5().to_string(),
            stored: bson::DateTime::from_time_0_3(node.stored()),
            public: node.public(),
        }
    }
}

impl TryFrom<NodeDoc> for Node {
    type Error = NodeStoreError;

    fn try_from(doc: NodeDoc) -> Result<Node> {
        let mut builder = Node::builder(
            doc.id,
            doc.owner.try_into()?,
            doc.size as u64,
            &doc.md5,
            doc.stored.to_time_0_3(),
        )
        .filename(&doc.filename)
        .format(&doc.format)
        .public(doc.public);
        for reader in doc.readers {
            builder = builder.reader(reader.try_into()?);
        }
        builder.build()
    }
}

/// Node store backed by MongoDB.
#[derive(Debug, Clone)]
pub struct MongoNodeStore {
    users: Collection<UserDoc>,
    nodes: Collection<NodeDoc>,
}

impl MongoNodeStore {
    /// Connect to MongoDB and set up collections and indexes.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| NodeStoreError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| NodeStoreError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        let db = client.database(db_name);
        let users = db.collection::<UserDoc>(USER_COLLECTION);
        let nodes = db.collection::<NodeDoc>(NODE_COLLECTION);

        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "account_name": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("account_name_unique".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(|e| NodeStoreError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(Self { users, nodes })
    }

    fn id_filter(id: Uuid) -> bson::Document {
        doc! { "_id": bson::Uuid::from_uuid_1(id) }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == 11000
    )
}

#[async_trait]
impl NodeStore for MongoNodeStore {
    async fn get_user(&self, account_name: &str) -> Result<User> {
        // Validate and trim up front; the fresh UUID is discarded if the user
        // already exists.
        let candidate = User::new(Uuid::new_v4(), account_name)?;

        let filter = doc! { "account_name": candidate.account_name() };
        if let Some(existing) = self.users.find_one(filter.clone()).await? {
            return User::new(existing.id, &existing.account_name);
        }

        let doc = UserDoc {
            id: candidate.id(),
            account_name: candidate.account_name().to_string(),
        };
        match self.users.insert_one(&doc).await {
            Ok(_) => Ok(candidate),
            Err(e) if is_duplicate_key(&e) => {
                // Lost a first-sight race; the winner's record is authoritative.
                let existing = self.users.find_one(filter).await?.ok_or_else(|| {
                    NodeStoreError::Database(format!(
                        "user {} disappeared after duplicate key error",
                        candidate.account_name()
                    ))
                })?;
                User::new(existing.id, &existing.account_name)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store_node(&self, node: &Node) -> Result<()> {
        match self.nodes.insert_one(NodeDoc::from(node)).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(NodeStoreError::DuplicateId(node.id())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_node(&self, id: Uuid) -> Result<Node> {
        self.nodes
            .find_one(Self::id_filter(id))
            .await?
            .ok_or(NodeStoreError::NoNode(id))?
            .try_into()
    }

    async fn delete_node(&self, id: Uuid) -> Result<()> {
        let result = self.nodes.delete_one(Self::id_filter(id)).await?;
        if result.deleted_count == 0 {
            return Err(NodeStoreError::NoNode(id));
        }
        Ok(())
    }

    async fn set_node_public(&self, id: Uuid, public: bool) -> Result<()> {
        let result = self
            .nodes
            .update_one(Self::id_filter(id), doc! { "$set": { "public": public } })
            .await?;
        if result.matched_count == 0 {
            return Err(NodeStoreError::NoNode(id));
        }
        Ok(())
    }

    async fn add_reader(&self, id: Uuid, user: &User) -> Result<()> {
        // The owner guard in the filter makes "user is the owner" a miss,
        // which is then told apart from a missing node below.
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(id),
            "owner.id": { "$ne": bson::Uuid::from_uuid_1(user.id()) },
        };
        let reader = bson::to_bson(&UserRef::from(user))?;
        let result = self
            .nodes
            .update_one(filter, doc! { "$addToSet": { "readers": reader } })
            .await?;
        if result.matched_count == 0 {
            // No-op if the user is the owner; NoNode if the node is missing.
            self.get_node(id).await?;
        }
        Ok(())
    }

    async fn remove_reader(&self, id: Uuid, user: &User) -> Result<()> {
        let pull = doc! {
            "$pull": { "readers": { "id": bson::Uuid::from_uuid_1(user.id()) } }
        };
        let result = self.nodes.update_one(Self::id_filter(id), pull).await?;
        if result.matched_count == 0 {
            return Err(NodeStoreError::NoNode(id));
        }
        Ok(())
    }

    async fn change_owner(&self, id: Uuid, user: &User) -> Result<()> {
        let owner = bson::to_bson(&UserRef::from(user))?;
        let update = doc! {
            "$set": { "owner": owner },
            "$pull": { "readers": { "id": bson::Uuid::from_uuid_1(user.id()) } },
        };
        let result = self.nodes.update_one(Self::id_filter(id), update).await?;
        if result.matched_count == 0 {
            return Err(NodeStoreError::NoNode(id));
        }
        Ok(())
    }
}
