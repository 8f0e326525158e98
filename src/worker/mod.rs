//! The worker protocol (§4.6, component G): poll, claim, fetch code,
//! execute, stream logs, report. Executing arbitrary user workflow code is
//! explicitly out of scope (§1); this module provides the harness around
//! that boundary — [`StageExecutor`] is the seam a host binary plugs a real
//! function dispatcher into.

pub mod cache;
pub mod client;
pub mod log_batcher;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;

use crate::errors::EngineError;

use cache::ModuleCache;
use client::{CallSummary, ControlPlaneClient};
use log_batcher::LogBatcher;

/// Carried into a stage function: `(control_plane_url, stage_run_id,
/// repo_name, commit_hash)` plus `read_file`/`write_file` (§4.6). Built
/// fresh per execution — "no cross-call context leakage" (§4.6).
pub struct StageContext {
    pub stage_run_id: String,
    pub repo_name: String,
    pub commit_hash: String,
    client: ControlPlaneClient,
    logs: LogBatcher,
}

impl StageContext {
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        self.client.read_file(&self.repo_name, &self.commit_hash, path).await
    }

    pub async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<String, EngineError> {
        self.client.write_file(&self.stage_run_id, path, bytes).await
    }

    pub fn log(&self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Dispatch a nested call through the same HTTP API used by any other
    /// caller (§4.6), then poll until terminal. Uses an async sleep backoff
    /// rather than a blocking wait, so the executor's task pool is never
    /// starved while a parent waits on a child (§5, §9).
    pub async fn call_child(&self, function_name: &str, workflow_file: &str, arguments: &Value) -> Result<Value, EngineError> {
        let child_id = self
            .client
            .create_call(
                Some(&self.stage_run_id),
                function_name,
                arguments,
                &self.repo_name,
                &self.commit_hash,
                workflow_file,
            )
            .await?;

        let mut backoff = Duration::from_millis(50);
        loop {
            let call = self.client.get_call(&child_id).await?;
            match call.status.as_str() {
                "completed" => return Ok(call.result.unwrap_or(Value::Null)),
                "failed" => return Err(EngineError::WorkflowExecutionError(format!("child call {child_id} failed"))),
                _ => {
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(2));
                }
            }
        }
    }
}

#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Run `stage_name` from `workflow_file`'s source with the given
    /// arguments. Any error returned here is recorded verbatim as the
    /// invocation's `error_message` (§4.8).
    async fn execute(&self, ctx: &StageContext, source: &[u8], stage_name: &str, arguments: Value) -> Result<Value, EngineError>;
}

pub struct WorkerConfig {
    pub server_url: String,
    pub worker_id: String,
    pub poll_interval: Duration,
    pub poll_limit: u32,
}

/// Run the poll → claim → fetch → execute → report loop forever (§4.6).
/// Each claimed call runs on its own `tokio::spawn`ed task, so polling is
/// never starved by in-flight executions (§4.6's "finished-task reaping
/// done between polls").
pub async fn run(config: WorkerConfig, executor: Arc<dyn StageExecutor>) -> ! {
    let client = ControlPlaneClient::new(config.server_url.clone());
    let cache = Arc::new(ModuleCache::new(64 * 1024 * 1024));

    loop {
        match client.list_pending_calls(config.poll_limit).await {
            Ok(calls) => {
                for call in calls {
                    let client = client.clone();
                    let cache = cache.clone();
                    let executor = executor.clone();
                    let worker_id = config.worker_id.clone();
                    tokio::spawn(async move {
                        if let Err(e) = execute_one(&client, &cache, executor.as_ref(), &worker_id, call).await {
                            tracing::warn!(error = %e, "stage run execution failed");
                        }
                    });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "poll failed, retrying next cycle");
            }
        }
        sleep(config.poll_interval).await;
    }
}

async fn execute_one(
    client: &ControlPlaneClient,
    cache: &Arc<ModuleCache>,
    executor: &dyn StageExecutor,
    worker_id: &str,
    call: CallSummary,
) -> Result<(), EngineError> {
    if !client.start_call(&call.invocation_id, worker_id).await? {
        // Lost the claim race (§8) — another worker got it first.
        return Ok(());
    }

    let source = cache
        .get_or_fetch(&call.repo_name, &call.commit_hash, &call.workflow_file, || {
            let client = client.clone();
            let repo = call.repo_name.clone();
            let commit = call.commit_hash.clone();
            let file = call.workflow_file.clone();
            async move { client.fetch_blob(&repo, &commit, &file).await }
        })
        .await?;

    let logs = LogBatcher::spawn(client.clone(), call.invocation_id.clone());
    let ctx = StageContext {
        stage_run_id: call.invocation_id.clone(),
        repo_name: call.repo_name.clone(),
        commit_hash: call.commit_hash.clone(),
        client: client.clone(),
        logs: logs.clone(),
    };

    let result = executor.execute(&ctx, &source, &call.function_name, call.arguments).await;
    logs.flush().await;

    match result {
        Ok(value) => client.finish_call_ok(&call.invocation_id, &value).await,
        Err(e) => client.finish_call_err(&call.invocation_id, &e.to_string()).await,
    }
}
