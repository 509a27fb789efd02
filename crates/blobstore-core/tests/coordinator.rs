//! End-to-end coordinator tests over in-memory stores.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blobstore_core::{BlobStore, BlobStoreError};
use bytes::Bytes;
use filestore::{ByteStream, FileStore, ObjectStoreConfig, S3FileStore};
use futures::{StreamExt, TryStreamExt};
use nodestore::{MemoryNodeStore, Node, NodeStore, NodeStoreError, User};
use time::OffsetDateTime;
use uuid::Uuid;

const CONTENT: &[u8] = b"012345678910";
const CONTENT_MD5: &str = "5d838d477ddf355fc15df1db90bee0aa";

fn stream_of(data: &'static [u8]) -> ByteStream {
    futures::stream::iter(vec![Ok(Bytes::from_static(data))]).boxed()
}

async fn collect(stream: ByteStream) -> Vec<u8> {
    let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
    chunks.concat()
}

/// Like `Result::unwrap_err`, but doesn't require the `Ok` type to implement
/// `Debug` (some `Ok` types here hold a boxed stream).
fn expect_err<T, E>(result: Result<T, E>) -> E {
    match result {
        Err(e) => e,
        Ok(_) => panic!("expected an error"),
    }
}

async fn fixture() -> (BlobStore, Arc<S3FileStore>, Arc<MemoryNodeStore>) {
    let filestore = Arc::new(S3FileStore::new(ObjectStoreConfig::Memory).await.unwrap());
    let nodestore = Arc::new(MemoryNodeStore::new());
    let store = BlobStore::new(filestore.clone(), nodestore.clone());
    (store, filestore, nodestore)
}

async fn users(nodestore: &MemoryNodeStore) -> (User, User) {
    let alice = nodestore.get_user("alice").await.unwrap();
    let bob = nodestore.get_user("bob").await.unwrap();
    (alice, bob)
}

#[tokio::test]
async fn test_ingest_round_trip() {
    let (store, _, nodestore) = fixture().await;
    let (alice, _) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "fn", "json")
        .await
        .unwrap();

    assert_eq!(node.size(), 12);
    assert_eq!(node.md5(), CONTENT_MD5);
    assert_eq!(node.filename(), "fn");
    assert_eq!(node.format(), "json");
    assert_eq!(node.owner(), &alice);
    assert!(node.readers().is_empty());
    assert!(!node.public());
    let age = OffsetDateTime::now_utc() - node.stored();
    assert!(age < time::Duration::seconds(1));

    let (data, size, filename) = store
        .get_file(Some(&alice), node.id(), 0, None)
        .await
        .unwrap();
    assert_eq!(collect(data).await, CONTENT);
    assert_eq!(size, 12);
    assert_eq!(filename, "fn");

    // a second store yields a distinct node ID
    let second = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();
    assert_ne!(node.id(), second.id());
}

#[tokio::test]
async fn test_store_boundaries() {
    let (store, _, nodestore) = fixture().await;
    let (alice, _) = users(&nodestore).await;

    let err = store
        .store(&alice, stream_of(b""), 0, "", "")
        .await
        .unwrap_err();
    assert!(matches!(err, BlobStoreError::InvalidInput(_)));

    let err = store
        .store(&alice, stream_of(CONTENT), 20, "", "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlobStoreError::ContentLengthMismatch {
            expected: 20,
            actual: 12
        }
    ));

    let err = store
        .store(&alice, stream_of(CONTENT), 5, "", "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlobStoreError::ContentLengthMismatch { expected: 5, .. }
    ));
}

#[tokio::test]
async fn test_read_acl() {
    let (store, _, nodestore) = fixture().await;
    let (alice, bob) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();

    // private: only the owner reads
    let err = store.get(Some(&bob), node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
    let err = store.get(None, node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
    let err = expect_err(store.get_file(Some(&bob), node.id(), 0, None).await);
    assert!(matches!(err, BlobStoreError::Unauthorized));

    // public: anyone reads, including anonymous callers
    store
        .set_node_public(&alice, node.id(), true)
        .await
        .unwrap();
    store.get(Some(&bob), node.id()).await.unwrap();
    store.get(None, node.id()).await.unwrap();
    let (data, _, _) = store.get_file(None, node.id(), 0, None).await.unwrap();
    assert_eq!(collect(data).await, CONTENT);

    // public does not grant delete
    let err = store.delete_node(&bob, node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
    store.get(Some(&alice), node.id()).await.unwrap();
}

#[tokio::test]
async fn test_reader_acl() {
    let (store, _, nodestore) = fixture().await;
    let (alice, bob) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();

    let updated = store
        .add_readers(&alice, node.id(), &["bob".to_string()])
        .await
        .unwrap();
    assert_eq!(updated.readers(), &[bob.clone()]);
    store.get(Some(&bob), node.id()).await.unwrap();

    // adding again, or adding the owner, changes nothing
    let updated = store
        .add_readers(&alice, node.id(), &["bob".to_string(), "alice".to_string()])
        .await
        .unwrap();
    assert_eq!(updated.readers(), &[bob.clone()]);

    // readers do not get mutation rights
    let err = store
        .add_readers(&bob, node.id(), &["bob".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
    let err = store
        .set_node_public(&bob, node.id(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
    let err = store.delete_node(&bob, node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));

    // removal is idempotent
    let updated = store
        .remove_readers(&alice, node.id(), &["bob".to_string()])
        .await
        .unwrap();
    assert!(updated.readers().is_empty());
    let updated = store
        .remove_readers(&alice, node.id(), &["bob".to_string()])
        .await
        .unwrap();
    assert!(updated.readers().is_empty());
    let err = store.get(Some(&bob), node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
}

#[tokio::test]
async fn test_change_owner_hygiene() {
    let (store, _, nodestore) = fixture().await;
    let (alice, bob) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();
    store
        .add_readers(&alice, node.id(), &["bob".to_string()])
        .await
        .unwrap();

    let updated = store.change_owner(&alice, node.id(), "bob").await.unwrap();
    assert_eq!(updated.owner(), &bob);
    assert!(updated.readers().is_empty());

    // previous owner lost control
    let err = store.change_owner(&alice, node.id(), "alice").await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));

    // handing the node to the current owner is a no-op
    let updated = store.change_owner(&bob, node.id(), "bob").await.unwrap();
    assert_eq!(updated.owner(), &bob);
    assert!(updated.readers().is_empty());
}

#[tokio::test]
async fn test_copy_inherits_nothing() {
    let (store, _, nodestore) = fixture().await;
    let (alice, bob) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "fn", "json")
        .await
        .unwrap();
    store
        .add_readers(&alice, node.id(), &["bob".to_string()])
        .await
        .unwrap();
    store
        .set_node_public(&alice, node.id(), true)
        .await
        .unwrap();

    let copy = store.copy_node(&bob, node.id()).await.unwrap();
    assert_ne!(copy.id(), node.id());
    assert_eq!(copy.owner(), &bob);
    assert!(copy.readers().is_empty());
    assert!(!copy.public());
    assert_eq!(copy.size(), node.size());
    assert_eq!(copy.md5(), node.md5());
    assert_eq!(copy.filename(), node.filename());
    assert_eq!(copy.format(), node.format());

    let (src_data, _, _) = store
        .get_file(Some(&alice), node.id(), 0, None)
        .await
        .unwrap();
    let (dst_data, _, _) = store
        .get_file(Some(&bob), copy.id(), 0, None)
        .await
        .unwrap();
    assert_eq!(collect(src_data).await, collect(dst_data).await);
}

#[tokio::test]
async fn test_copy_requires_read() {
    let (store, _, nodestore) = fixture().await;
    let (alice, bob) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();
    let err = store.copy_node(&bob, node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Unauthorized));
}

#[tokio::test]
async fn test_delete_node_removes_blob_and_metadata() {
    let (store, filestore, nodestore) = fixture().await;
    let (alice, _) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();
    store.delete_node(&alice, node.id()).await.unwrap();

    let err = store.get(Some(&alice), node.id()).await.unwrap_err();
    assert!(matches!(err, BlobStoreError::NoNode(id) if id == node.id()));
    let err = expect_err(filestore.get_file(&node.id().to_string(), 0, None).await);
    assert!(matches!(err, filestore::FileStoreError::NoBlob(_)));
}

#[tokio::test]
async fn test_missing_node() {
    let (store, _, nodestore) = fixture().await;
    let (alice, _) = users(&nodestore).await;
    let id = Uuid::new_v4();

    assert!(matches!(
        store.get(Some(&alice), id).await.unwrap_err(),
        BlobStoreError::NoNode(n) if n == id
    ));
    assert!(matches!(
        store.copy_node(&alice, id).await.unwrap_err(),
        BlobStoreError::NoNode(_)
    ));
    assert!(matches!(
        store.delete_node(&alice, id).await.unwrap_err(),
        BlobStoreError::NoNode(_)
    ));
    assert!(matches!(
        expect_err(store.get_file(Some(&alice), id, 0, None).await),
        BlobStoreError::NoNode(_)
    ));
}

#[tokio::test]
async fn test_missing_blob_on_existing_node() {
    let (store, filestore, nodestore) = fixture().await;
    let (alice, _) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();

    // tamper: remove the object out-of-band
    filestore
        .delete_file(&node.id().to_string())
        .await
        .unwrap();

    // metadata still reads; bytes report the missing blob
    store.get(Some(&alice), node.id()).await.unwrap();
    let err = expect_err(store.get_file(Some(&alice), node.id(), 0, None).await);
    assert!(matches!(err, BlobStoreError::NoBlob(_)));
}

#[tokio::test]
async fn test_get_file_seek_past_end() {
    let (store, _, nodestore) = fixture().await;
    let (alice, _) = users(&nodestore).await;

    let node = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap();

    let (data, _, _) = store
        .get_file(Some(&alice), node.id(), 12, None)
        .await
        .unwrap();
    assert!(collect(data).await.is_empty());

    let (data, _, _) = store
        .get_file(Some(&alice), node.id(), 4, Some(4))
        .await
        .unwrap();
    assert_eq!(collect(data).await, b"4567");
}

/// Node store wrapper that rejects inserts with `DuplicateId`, for driving
/// the coordinator's compensation path.
struct CollidingNodeStore {
    inner: MemoryNodeStore,
    rejected: Mutex<Option<Uuid>>,
}

impl CollidingNodeStore {
    fn new() -> Self {
        Self {
            inner: MemoryNodeStore::new(),
            rejected: Mutex::new(None),
        }
    }
}

#[async_trait]
impl NodeStore for CollidingNodeStore {
    async fn get_user(&self, account_name: &str) -> nodestore::Result<User> {
        self.inner.get_user(account_name).await
    }

    async fn store_node(&self, node: &Node) -> nodestore::Result<()> {
        *self.rejected.lock().unwrap() = Some(node.id());
        Err(NodeStoreError::DuplicateId(node.id()))
    }

    async fn get_node(&self, id: Uuid) -> nodestore::Result<Node> {
        self.inner.get_node(id).await
    }

    async fn delete_node(&self, id: Uuid) -> nodestore::Result<()> {
        self.inner.delete_node(id).await
    }

    async fn set_node_public(&self, id: Uuid, public: bool) -> nodestore::Result<()> {
        self.inner.set_node_public(id, public).await
    }

    async fn add_reader(&self, id: Uuid, user: &User) -> nodestore::Result<()> {
        self.inner.add_reader(id, user).await
    }

    async fn remove_reader(&self, id: Uuid, user: &User) -> nodestore::Result<()> {
        self.inner.remove_reader(id, user).await
    }

    async fn change_owner(&self, id: Uuid, user: &User) -> nodestore::Result<()> {
        self.inner.change_owner(id, user).await
    }
}

#[tokio::test]
async fn test_duplicate_id_cleans_up_blob() {
    let filestore = Arc::new(S3FileStore::new(ObjectStoreConfig::Memory).await.unwrap());
    let nodestore = Arc::new(CollidingNodeStore::new());
    let store = BlobStore::new(filestore.clone(), nodestore.clone());
    let alice = nodestore.get_user("alice").await.unwrap();

    let err = store
        .store(&alice, stream_of(CONTENT), 12, "", "")
        .await
        .unwrap_err();
    assert!(matches!(err, BlobStoreError::DuplicateId(_)));

    // the losing upload's blob was cleaned up
    let id = nodestore.rejected.lock().unwrap().take().unwrap();
    let err = expect_err(filestore.get_file(&id.to_string(), 0, None).await);
    assert!(matches!(err, filestore::FileStoreError::NoBlob(_)));
}
