//! Filesystem-backed [`super::BlobStore`] (§4.1).
//!
//! `storage_key = <base>/<hash[0:2]>/<hash[2:]>`; store writes bytes only if
//! absent; deletion attempts to prune the now-empty parent shard directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::canonical::sha256_hex;
use crate::errors::EngineError;

use super::{BlobStore, StoredBlob, shard_key};

pub struct FilesystemBlobStore {
    base: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// `storage_key` per §4.1/§6.2: `<base>/<hash[0:2]>/<hash[2:]>`.
    fn storage_key(&self, hash: &str) -> Result<String, EngineError> {
        shard_key(&self.base.to_string_lossy(), hash)
    }

    fn path_for(&self, hash: &str) -> Result<PathBuf, EngineError> {
        if hash.len() < 3 {
            return Err(EngineError::InvalidInput(format!("hash too short: {hash}")));
        }
        let (head, rest) = hash.split_at(2);
        Ok(self.base.join(head).join(rest))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn store(&self, bytes: &[u8]) -> Result<StoredBlob, EngineError> {
        let hash = sha256_hex(bytes);
        let path = self.path_for(&hash)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::StorageError(e.to_string()))?;
        }
        if fs::try_exists(&path)
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))?
        {
            // content-addressed idempotent write: same bytes, same key, no-op.
            return Ok(StoredBlob {
                storage_key: self.storage_key(&hash)?,
                size: bytes.len() as i64,
                hash,
            });
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        Ok(StoredBlob {
            storage_key: self.storage_key(&hash)?,
            size: bytes.len() as i64,
            hash,
        })
    }

    async fn retrieve(&self, hash: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let path = self.path_for(hash)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::StorageError(e.to_string())),
        }
    }

    async fn exists(&self, hash: &str) -> Result<bool, EngineError> {
        let path = self.path_for(hash)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))
    }

    async fn delete(&self, hash: &str) -> Result<bool, EngineError> {
        let path = self.path_for(hash)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                if let Some(parent) = path.parent() {
                    let _ = fs::remove_dir(parent).await; // best-effort, only succeeds if empty
                }
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EngineError::StorageError(e.to_string())),
        }
    }

    async fn download_url(&self, hash: &str, _ttl_seconds: u64) -> Result<Option<String>, EngineError> {
        if !self.exists(hash).await? {
            return Ok(None);
        }
        let path = self.path_for(hash)?;
        Ok(Some(format!("file://{}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_is_idempotent_and_retrieve_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let first = store.store(b"hello").await.unwrap();
        let second = store.store(b"hello").await.unwrap();
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.storage_key, second.storage_key);

        let fetched = store.retrieve(&first.hash).await.unwrap().unwrap();
        assert_eq!(fetched, b"hello");
        assert!(store.exists(&first.hash).await.unwrap());
    }

    #[tokio::test]
    async fn retrieve_unknown_hash_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());
        let unknown = sha256_hex(b"never stored");
        assert!(store.retrieve(&unknown).await.unwrap().is_none());
        assert!(!store.exists(&unknown).await.unwrap());
    }

    #[tokio::test]
    async fn delete_prunes_empty_shard_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path());
        let stored = store.store(b"bye").await.unwrap();
        assert!(store.delete(&stored.hash).await.unwrap());
        assert!(!store.delete(&stored.hash).await.unwrap());
    }
}
