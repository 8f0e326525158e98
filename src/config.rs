use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Selects which [`crate::blobstore::BlobStore`] backend the engine uses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Filesystem,
    ObjectStore,
}

/// Layered runtime configuration for the control plane and worker binaries.
///
/// Shaped like [`PackConfig`]/[`LfsConfig`] above: a plain struct with a
/// [`Default`] impl for every field that has a sane default. Values are read
/// from the process environment first (§6.3) and fall back to these
/// defaults; no on-disk config-file format is defined, so there is no
/// loader beyond `std::env`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EngineConfig {
    /// `DATABASE_URL` — relational store DSN.
    pub database_url: String,
    /// Selected by presence of `S3_BUCKET`.
    pub storage_backend: StorageBackend,
    /// `S3_BUCKET`, only meaningful when `storage_backend` is `ObjectStore`.
    pub s3_bucket: Option<String>,
    /// `STORAGE_BASE_PATH` — root directory for the filesystem backend.
    pub storage_base_path: PathBuf,
    /// `PORT` — control-plane bind port.
    pub port: u16,
    /// Control-plane bind host.
    pub host: String,
    /// `DEBUG` — enables verbose logging and SQL echo.
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://stageflow.db?mode=rwc".to_string(),
            storage_backend: StorageBackend::Filesystem,
            s3_bucket: None,
            storage_base_path: PathBuf::from("blobs"),
            port: 8080,
            host: "0.0.0.0".to_string(),
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Build a config from the environment variables named in §6.3, falling
    /// back to [`Default`] for anything unset.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Ok(v) = std::env::var("S3_BUCKET") {
            cfg.storage_backend = StorageBackend::ObjectStore;
            cfg.s3_bucket = Some(v);
        }
        if let Ok(v) = std::env::var("STORAGE_BASE_PATH") {
            cfg.storage_base_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PORT") {
            if let Ok(port) = v.parse() {
                cfg.port = port;
            }
        }
        if let Ok(v) = std::env::var("DEBUG") {
            cfg.debug = matches!(v.as_str(), "1" | "true" | "TRUE" | "True");
        }
        cfg
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PackConfig {
    #[serde(deserialize_with = "string_or_usize")]
    pub pack_decode_mem_size: String,
    #[serde(deserialize_with = "string_or_usize")]
    pub pack_decode_disk_size: String,
    pub pack_decode_cache_path: PathBuf,
    pub clean_cache_after_decode: bool,
    pub channel_message_size: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            pack_decode_mem_size: "4G".to_string(),
            pack_decode_disk_size: "20%".to_string(),
            pack_decode_cache_path: PathBuf::from("pack_decode_cache"),
            clean_cache_after_decode: true,
            channel_message_size: 1_000_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LfsConfig {
    pub enable: bool,
    pub host: String,
    pub port: u16,
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

fn string_or_usize<'deserialize, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'deserialize>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrUSize {
        String(String),
        USize(usize),
    }

    Ok(match StringOrUSize::deserialize(deserializer)? {
        StringOrUSize::String(v) => v,
        StringOrUSize::USize(v) => v.to_string(),
    })
}
