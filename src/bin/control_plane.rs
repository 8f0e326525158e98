//! Control-plane binary (§6.4): serves the HTTP API in [`stageflow::http`].
//!
//! Standard `#[tokio::main]`/`axum::serve` startup, with env-driven
//! configuration (§6.3) layered on top via `clap`'s `env` feature so flags
//! and environment variables both work.

use std::sync::Arc;

use clap::Parser;

use stageflow::blobstore::filesystem::FilesystemBlobStore;
use stageflow::blobstore::object_store::ObjectStoreBlobStore;
use stageflow::blobstore::BlobStore;
use stageflow::config::{EngineConfig, StorageBackend};
use stageflow::http::{router, AppState};
use stageflow::{db, telemetry};

#[derive(Parser, Debug)]
#[command(name = "control-plane", about = "stageflow control plane")]
struct Args {
    #[arg(long, env = "HOST")]
    host: Option<String>,

    #[arg(long, env = "PORT")]
    port: Option<u16>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = EngineConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }
    config.debug = config.debug || args.debug;

    telemetry::init(config.debug);

    let db = db::connect(&config.database_url).await?;

    let store: Arc<dyn BlobStore> = match config.storage_backend {
        StorageBackend::Filesystem => Arc::new(FilesystemBlobStore::new(config.storage_base_path.clone())),
        StorageBackend::ObjectStore => {
            let bucket = config.s3_bucket.clone().unwrap_or_else(|| "stageflow".to_string());
            Arc::new(ObjectStoreBlobStore::new("http://localhost:9000", bucket))
        }
    };

    let state = Arc::new(AppState { db, store });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(%addr, "control plane listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
