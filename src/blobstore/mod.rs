//! Content-addressed byte storage (§4.1, component A).
//!
//! Two backends ([`filesystem::FilesystemBlobStore`],
//! [`object_store::ObjectStoreBlobStore`]) share one `async` trait
//! (`async_trait`) so request handlers and worker code depend on a single
//! abstraction rather than a concrete backend type.

pub mod filesystem;
pub mod object_store;

use async_trait::async_trait;

use crate::errors::EngineError;

/// Outcome of a successful [`BlobStore::store`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub hash: String,
    pub storage_key: String,
    pub size: i64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Content-addressed, idempotent write. Writing the same bytes twice
    /// (even concurrently) is a no-op on the second write (§5).
    async fn store(&self, bytes: &[u8]) -> Result<StoredBlob, EngineError>;

    /// `None` if the hash is unknown. `retrieve(hash) != None ⟺ exists(hash)`.
    async fn retrieve(&self, hash: &str) -> Result<Option<Vec<u8>>, EngineError>;

    async fn exists(&self, hash: &str) -> Result<bool, EngineError>;

    async fn delete(&self, hash: &str) -> Result<bool, EngineError>;

    /// A URI from which `hash`'s bytes can be fetched, valid for roughly
    /// `ttl_seconds`. Backends that have no real expiry (filesystem) may
    /// ignore `ttl_seconds` and still return a stable URI.
    async fn download_url(&self, hash: &str, ttl_seconds: u64) -> Result<Option<String>, EngineError>;
}

/// `storage_key` sharding shared by both backends: `<prefix>/<hash[0:2]>/<hash[2:]>`.
pub(crate) fn shard_key(prefix: &str, hash: &str) -> Result<String, EngineError> {
    if hash.len() < 3 {
        return Err(EngineError::InvalidInput(format!("hash too short: {hash}")));
    }
    let (head, rest) = hash.split_at(2);
    Ok(format!("{prefix}/{head}/{rest}"))
}
