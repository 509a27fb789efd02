//! The blob store coordinator.
//!
//! Glues together the file store (bytes), the node store (metadata + ACLs)
//! and enforces the authorization model. Bytes are written before metadata
//! so that any node visible in the node store has retrievable bytes; the
//! reverse - an orphan blob after a failed metadata write - is tolerated
//! because orphans are unreachable by ID, and a best-effort compensating
//! delete is attempted anyway.

mod error;
mod store;

pub use error::{BlobStoreError, Result};
pub use store::BlobStore;
