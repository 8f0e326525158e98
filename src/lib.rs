//! A distributed workflow execution engine on a content-addressed, Git-like
//! object store (§1-§2). The control plane dispatches content-addressable
//! `StageRun` invocations to remote workers over a unified virtual
//! filesystem, gated by a pull-request check engine.

pub mod blobstore;
pub mod canonical;
pub mod checks;
pub mod config;
pub mod db;
pub mod diff;
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod model;
pub mod repo_ops;
pub mod telemetry;
pub mod vfs;
pub mod worker;