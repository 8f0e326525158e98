//! Tracing/logging initialization shared by all three binaries.
//!
//! Built on `tracing`/`tracing-subscriber`. Request handlers and worker
//! loops log with structured fields (`repo_name`, `stage_run_id`, `status`)
//! instead of `println!`.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber. `RUST_LOG` wins if set; otherwise `debug`
/// drives `debug`-level filtering, else `info`.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
