//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, GetOptions, GetRange, MultipartUpload, ObjectStore, PutMultipartOpts,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{FileStoreError, Result};

/// Part size for multipart uploads (8MB). S3 requires at least 5MB for all
/// parts except the last.
const UPLOAD_PART_SIZE: usize = 8 * 1024 * 1024;

/// A stream of blob bytes, owned by the caller.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Validated parameters for storing a blob.
pub struct StoreFileParams {
    id: String,
    size: u64,
    data: ByteStream,
    filename: String,
    format: String,
}

impl StoreFileParams {
    /// Create store parameters. The id must be non-empty after trimming and
    /// the declared size must be at least one byte.
    pub fn new(id: &str, size: u64, data: ByteStream) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(FileStoreError::InvalidInput(
                "id cannot be empty or whitespace only".into(),
            ));
        }
        if size < 1 {
            return Err(FileStoreError::InvalidInput("size must be > 0".into()));
        }
        Ok(Self {
            id: id.to_string(),
            size,
            data,
            filename: String::new(),
            format: String::new(),
        })
    }

    /// Attach a file name. Stored as backup object metadata only.
    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = filename.trim().to_string();
        self
    }

    /// Attach a file format. Stored as backup object metadata only.
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.trim().to_string();
        self
    }
}

/// The result of storing a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// The blob id.
    pub id: String,
    /// Size of the blob in bytes.
    pub size: u64,
    /// MD5 of the blob bytes, 32 lowercase hex characters.
    pub md5: String,
    /// When the blob was stored.
    pub stored: OffsetDateTime,
    /// File name, possibly empty.
    pub filename: String,
    /// File format, possibly empty.
    pub format: String,
}

/// Byte-level blob persistence keyed by blob id.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stream the caller's bytes into storage, computing size and MD5 on the
    /// way. The stream is consumed no further than the declared size; a
    /// shorter or longer stream aborts the upload with
    /// [`FileStoreError::ContentLengthMismatch`].
    async fn store_file(&self, params: StoreFileParams) -> Result<FileInfo>;

    /// Stream a blob back out, starting at byte `seek`, returning at most
    /// `length` bytes (`None` means to the end). A seek at or past the end
    /// of the blob yields an empty stream.
    async fn get_file(&self, id: &str, seek: u64, length: Option<u64>) -> Result<ByteStream>;

    /// Server-side copy of a blob to a new id. No byte traversal.
    async fn copy_file(&self, src: &str, dst: &str) -> Result<()>;

    /// Delete a blob. Idempotent; a missing blob is not an error.
    async fn delete_file(&self, id: &str) -> Result<()>;
}

/// Blob store over an `object_store` backend scoped to a single bucket.
#[derive(Debug, Clone)]
pub struct S3FileStore {
    inner: Arc<dyn ObjectStore>,
    // The local filesystem backend rejects object attributes.
    attributes_supported: bool,
}

impl S3FileStore {
    /// Create a new blob store from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let mut attributes_supported = true;
        let inner: Arc<dyn ObjectStore> = match &config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                attributes_supported = false;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| FileStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                if bucket.trim().is_empty() {
                    return Err(FileStoreError::InvalidConfig(
                        "bucket cannot be empty or whitespace only".into(),
                    ));
                }
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket.trim())
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| FileStoreError::InvalidConfig(e.to_string()))?,
                );

                // Verify the bucket exists by listing the empty prefix. This
                // fails fast if the bucket is missing.
                {
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(FileStoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(FileStoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        Ok(Self {
            inner,
            attributes_supported,
        })
    }

    /// Build the object path for a blob id.
    fn blob_path(id: &str) -> ObjectPath {
        ObjectPath::from(id)
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn store_file(&self, params: StoreFileParams) -> Result<FileInfo> {
        let StoreFileParams {
            id,
            size,
            mut data,
            filename,
            format,
        } = params;
        let path = Self::blob_path(&id);

        let mut attributes = Attributes::new();
        if self.attributes_supported {
            if !filename.is_empty() {
                attributes.insert(Attribute::Metadata("filename".into()), filename.clone().into());
            }
            if !format.is_empty() {
                attributes.insert(Attribute::Metadata("format".into()), format.clone().into());
            }
        }
        let opts = PutMultipartOpts {
            attributes,
            ..Default::default()
        };

        let mut upload = self.inner.put_multipart_opts(&path, opts).await?;
        let mut hasher = Md5::new();
        let mut received: u64 = 0;
        let mut pending: Vec<u8> = Vec::new();
        let mut failed: Option<FileStoreError> = None;

        // Consume the stream no further than the declared size.
        while received < size {
            match data.next().await {
                Some(Ok(chunk)) => {
                    received += chunk.len() as u64;
                    if received > size {
                        failed = Some(FileStoreError::ContentLengthMismatch {
                            expected: size,
                            actual: received,
                        });
                        break;
                    }
                    hasher.update(&chunk);
                    pending.extend_from_slice(&chunk);
                    if pending.len() >= UPLOAD_PART_SIZE {
                        let part = std::mem::take(&mut pending);
                        if let Err(e) = upload.put_part(part.into()).await {
                            failed = Some(e.into());
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    failed = Some(FileStoreError::Io(e));
                    break;
                }
                None => break,
            }
        }

        if failed.is_none() && received != size {
            failed = Some(FileStoreError::ContentLengthMismatch {
                expected: size,
                actual: received,
            });
        }

        if let Some(err) = failed {
            if let Err(abort_err) = upload.abort().await {
                tracing::warn!(id = %id, error = %abort_err, "failed to abort blob upload");
            }
            return Err(err);
        }

        if !pending.is_empty() {
            upload.put_part(pending.into()).await?;
        }
        upload.complete().await?;

        let md5 = format!("{:x}", hasher.finalize());
        tracing::debug!(id = %id, size = size, md5 = %md5, "blob stored");

        Ok(FileInfo {
            id,
            size,
            md5,
            stored: OffsetDateTime::now_utc(),
            filename,
            format,
        })
    }

    async fn get_file(&self, id: &str, seek: u64, length: Option<u64>) -> Result<ByteStream> {
        let path = Self::blob_path(id);

        let meta = match self.inner.head(&path).await {
            Ok(meta) => meta,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(FileStoreError::NoBlob(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let start = seek.min(meta.size);
        let end = match length {
            Some(len) => start.saturating_add(len).min(meta.size),
            None => meta.size,
        };
        if start >= end {
            return Ok(futures::stream::empty().boxed());
        }

        let opts = GetOptions {
            range: Some(GetRange::Bounded(start..end)),
            ..Default::default()
        };
        let result = match self.inner.get_opts(&path, opts).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(FileStoreError::NoBlob(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(result.into_stream().map_err(std::io::Error::other).boxed())
    }

    async fn copy_file(&self, src: &str, dst: &str) -> Result<()> {
        match self.inner.copy(&Self::blob_path(src), &Self::blob_path(dst)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Err(FileStoreError::NoBlob(src.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_file(&self, id: &str) -> Result<()> {
        // Ignore NotFound errors - the blob may already be deleted
        match self.inner.delete(&Self::blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
