//! Worker binary (§6.4): runs the poll/claim/execute/report loop in
//! [`stageflow::worker::run`].
//!
//! Executing arbitrary user workflow code is explicitly out of scope (§1);
//! [`EchoExecutor`] is a stand-in [`StageExecutor`] that returns its
//! arguments verbatim. A deployment wires in its own executor that actually
//! interprets `workflow_file`'s source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;

use stageflow::errors::EngineError;
use stageflow::telemetry;
use stageflow::worker::{run, StageContext, StageExecutor, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "worker", about = "stageflow worker")]
struct Args {
    #[arg(long, env = "STAGEFLOW_SERVER_URL")]
    server_url: String,

    #[arg(long, env = "STAGEFLOW_WORKER_ID")]
    worker_id: Option<String>,

    #[arg(long, env = "STAGEFLOW_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    #[arg(long, env = "STAGEFLOW_POLL_LIMIT", default_value_t = 16)]
    poll_limit: u32,

    #[arg(long, env = "DEBUG")]
    debug: bool,
}

struct EchoExecutor;

#[async_trait]
impl StageExecutor for EchoExecutor {
    async fn execute(&self, ctx: &StageContext, _source: &[u8], stage_name: &str, arguments: Value) -> Result<Value, EngineError> {
        ctx.log(format!("executing {stage_name}"));
        Ok(arguments)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    telemetry::init(args.debug);

    let worker_id = args.worker_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let config = WorkerConfig {
        server_url: args.server_url,
        worker_id,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        poll_limit: args.poll_limit,
    };

    tracing::info!(worker_id = %config.worker_id, server_url = %config.server_url, "worker starting");
    run(config, Arc::new(EchoExecutor)).await;
}
