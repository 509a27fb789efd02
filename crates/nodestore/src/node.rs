//! User and node domain types.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{NodeStoreError, Result};

/// Upper bound on account name length after trimming. Account names are used
/// as index keys, which need a bound.
pub const MAX_ACCOUNT_NAME_LEN: usize = 256;

/// A user that may own or read nodes. The ID is assigned by the system at
/// first sight; the account name is the user's name in external systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: Uuid,
    account_name: String,
}

impl User {
    /// Create a user. The account name is whitespace-trimmed and must be
    /// non-empty.
    pub fn new(id: Uuid, account_name: &str) -> Result<Self> {
        let account_name = account_name.trim();
        if account_name.is_empty() {
            return Err(NodeStoreError::InvalidInput(
                "accountName cannot be empty or whitespace only".into(),
            ));
        }
        if account_name.len() > MAX_ACCOUNT_NAME_LEN {
            return Err(NodeStoreError::InvalidInput(format!(
                "accountName exceeds {} bytes",
                MAX_ACCOUNT_NAME_LEN
            )));
        }
        Ok(Self {
            id,
            account_name: account_name.to_string(),
        })
    }

    /// The user's internal system ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The user's name in external systems.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }
}

/// The metadata record for one stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: Uuid,
    owner: User,
    readers: Vec<User>,
    filename: String,
    format: String,
    size: u64,
    md5: String,
    stored: OffsetDateTime,
    public: bool,
}

impl Node {
    /// Start building a node from its required fields.
    pub fn builder(
        id: Uuid,
        owner: User,
        size: u64,
        md5: &str,
        stored: OffsetDateTime,
    ) -> NodeBuilder {
        NodeBuilder {
            id,
            owner,
            size,
            md5: md5.to_string(),
            stored,
            filename: String::new(),
            format: String::new(),
            readers: Vec::new(),
            public: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &User {
        &self.owner
    }

    /// Users that may read the node. Never contains the owner.
    pub fn readers(&self) -> &[User] {
        &self.readers
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn stored(&self) -> OffsetDateTime {
        self.stored
    }

    pub fn public(&self) -> bool {
        self.public
    }
}

/// Builder for [`Node`]. Optional fields are filled by name; `build`
/// validates the whole record.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    id: Uuid,
    owner: User,
    size: u64,
    md5: String,
    stored: OffsetDateTime,
    filename: String,
    format: String,
    readers: Vec<User>,
    public: bool,
}

impl NodeBuilder {
    /// Set the file name, whitespace-trimmed.
    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = filename.trim().to_string();
        self
    }

    /// Set the file format, whitespace-trimmed.
    pub fn format(mut self, format: &str) -> Self {
        self.format = format.trim().to_string();
        self
    }

    /// Add a user to the read ACL. Duplicates and the owner are dropped at
    /// build time.
    pub fn reader(mut self, user: User) -> Self {
        self.readers.push(user);
        self
    }

    /// Set whether the node is publicly readable.
    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn build(self) -> Result<Node> {
        if self.size < 1 {
            return Err(NodeStoreError::InvalidInput("size must be > 0".into()));
        }
        if !valid_md5(&self.md5) {
            return Err(NodeStoreError::InvalidInput(format!(
                "invalid MD5: {}",
                self.md5
            )));
        }
        let mut readers: Vec<User> = Vec::with_capacity(self.readers.len());
        for user in self.readers {
            if user != self.owner && !readers.contains(&user) {
                readers.push(user);
            }
        }
        Ok(Node {
            id: self.id,
            owner: self.owner,
            readers,
            filename: self.filename,
            format: self.format,
            size: self.size,
            md5: self.md5,
            stored: self.stored,
            public: self.public,
        })
    }
}

fn valid_md5(md5: &str) -> bool {
    md5.len() == 32
        && md5
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
