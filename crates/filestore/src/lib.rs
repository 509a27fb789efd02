//! Blob persistence over pluggable object storage.
//!
//! This crate provides the byte-level half of the blob store: opaque blobs
//! keyed by node ID, stored in S3/MinIO, the local filesystem, or memory.
//! Ingest streams the caller's bytes into the backend while computing the
//! MD5 and enforcing the declared content length; reads stream back out with
//! optional byte ranges. Metadata about blobs is owned elsewhere; the
//! filename/format attached here is a backup aid only.

mod error;
mod store;

pub use error::{FileStoreError, Result};
pub use store::{
    ByteStream, FileInfo, FileStore, ObjectStoreConfig, S3FileStore, StoreFileParams,
};
