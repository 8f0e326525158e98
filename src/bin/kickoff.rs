//! Kickoff binary (§6.4): creates a root invocation over the HTTP API and
//! polls it to a terminal state, printing the result or error to stdout.
//!
//! Reuses [`ControlPlaneClient`] rather than hand-rolling `reqwest` calls —
//! it is the same client the worker uses to talk to the control plane, so
//! this binary exercises the exact wire shapes a worker would.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use tokio::time::sleep;

use stageflow::telemetry;
use stageflow::worker::client::ControlPlaneClient;

#[derive(Parser, Debug)]
#[command(name = "kickoff", about = "dispatch a root stageflow invocation and wait for its result")]
struct Args {
    #[arg(long)]
    control_plane: String,

    #[arg(long)]
    repo: String,

    #[arg(long)]
    commit: String,

    #[arg(long = "file")]
    workflow_file: String,

    #[arg(long)]
    function: String,

    #[arg(long, default_value = "{}")]
    arguments: String,

    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init(args.debug);

    let arguments: Value = match serde_json::from_str(&args.arguments) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("invalid --arguments JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let client = ControlPlaneClient::new(args.control_plane);
    let invocation_id = match client
        .create_call(None, &args.function, &arguments, &args.repo, &args.commit, &args.workflow_file)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            eprintln!("failed to create call: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%invocation_id, "call created, waiting for completion");

    let mut backoff = Duration::from_millis(100);
    loop {
        let call = match client.get_call(&invocation_id).await {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to poll call {invocation_id}: {e}");
                return ExitCode::FAILURE;
            }
        };
        match call.status.as_str() {
            "completed" => {
                let result = call.result.unwrap_or(Value::Null);
                println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
                return ExitCode::SUCCESS;
            }
            "failed" => {
                eprintln!("call {invocation_id} failed: {}", call.error.unwrap_or_default());
                return ExitCode::FAILURE;
            }
            _ => {
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
            }
        }
    }
}
