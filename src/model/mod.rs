//! Domain entities (§3).
//!
//! Every entity except [`stage_run::StageRun`] and
//! [`stage_run::StageLogLine`] is scoped to a [`repository::Repository`].
//! Hashes throughout are SHA-256 hex, computed via [`crate::canonical`].

pub mod pull_request;
pub mod repository;
pub mod stage;
pub mod stage_run;
pub mod tree;

pub use pull_request::{PullRequest, PullRequestComment, PullRequestStatus};
pub use repository::Repository;
pub use stage::{Stage, StagingFile};
pub use stage_run::{StageFile, StageLogLine, StageRun, StageRunStatus};
pub use tree::{Blob, Commit, EntryKind, Tree, TreeEntry};
