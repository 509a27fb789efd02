//! Durable node metadata and the user identity registry.
//!
//! A node is the metadata record paired 1:1 with a stored blob: owner, reader
//! ACL, public flag, size, MD5, filename, format and ingest timestamp. Users
//! map external account names to stable internal UUIDs, assigned once at
//! first sight.
//!
//! The [`NodeStore`] trait is implemented for MongoDB ([`MongoNodeStore`])
//! and in memory ([`MemoryNodeStore`], used as a test fixture).

mod error;
mod memory;
mod mongo;
mod node;
mod store;

pub use error::{NodeStoreError, Result};
pub use memory::MemoryNodeStore;
pub use mongo::MongoNodeStore;
pub use node::{Node, NodeBuilder, User, MAX_ACCOUNT_NAME_LEN};
pub use store::NodeStore;
