//! S3-compatible [`super::BlobStore`] (§4.1).
//!
//! `storage_key = blobs/<hash[0:2]>/<hash[2:]>`. Issues plain HTTP
//! PUT/GET/HEAD/DELETE against a configured endpoint via `reqwest` rather
//! than pulling in an AWS SDK: §1's Non-goals exclude "S3 SDK wiring" as a
//! concern this spec owns, so request signing (SigV4) is left to whatever
//! reverse proxy or credential-injecting sidecar fronts `endpoint` in
//! production — the engine only needs the storage-key addressing contract,
//! not a full S3 client. Noted in DESIGN.md.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::canonical::sha256_hex;
use crate::errors::EngineError;

use super::{BlobStore, StoredBlob, shard_key};

pub struct ObjectStoreBlobStore {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl ObjectStoreBlobStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    fn storage_key(&self, hash: &str) -> Result<String, EngineError> {
        shard_key("blobs", hash)
    }

    fn object_url(&self, storage_key: &str) -> String {
        format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), self.bucket, storage_key)
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn store(&self, bytes: &[u8]) -> Result<StoredBlob, EngineError> {
        let hash = sha256_hex(bytes);
        let storage_key = self.storage_key(&hash)?;
        let url = self.object_url(&storage_key);

        if self.exists(&hash).await? {
            return Ok(StoredBlob {
                hash,
                storage_key,
                size: bytes.len() as i64,
            });
        }

        let resp = self
            .client
            .put(&url)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(EngineError::StorageError(format!(
                "PUT {url} failed: {}",
                resp.status()
            )));
        }
        Ok(StoredBlob {
            hash,
            storage_key,
            size: bytes.len() as i64,
        })
    }

    async fn retrieve(&self, hash: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let url = self.object_url(&self.storage_key(hash)?);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| EngineError::StorageError(e.to_string()))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(EngineError::StorageError(format!("GET {url} failed: {status}"))),
        }
    }

    async fn exists(&self, hash: &str) -> Result<bool, EngineError> {
        let url = self.object_url(&self.storage_key(hash)?);
        let resp = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        Ok(resp.status().is_success())
    }

    async fn delete(&self, hash: &str) -> Result<bool, EngineError> {
        let url = self.object_url(&self.storage_key(hash)?);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(EngineError::StorageError(format!("DELETE {url} failed: {status}"))),
        }
    }

    async fn download_url(&self, hash: &str, ttl_seconds: u64) -> Result<Option<String>, EngineError> {
        if !self.exists(hash).await? {
            return Ok(None);
        }
        let expires = chrono::Utc::now().timestamp() + ttl_seconds as i64;
        let url = self.object_url(&self.storage_key(hash)?);
        Ok(Some(format!("{url}?X-Expires={expires}")))
    }
}
