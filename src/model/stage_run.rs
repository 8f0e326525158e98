//! StageRun (invocation), StageFile (output) and StageLogLine (§3, §4.5).
//!
//! # Status Transitions
//!
//! ```text
//!        create
//!          ↓
//!       PENDING ──claim──▶ RUNNING ──finish:ok────▶ COMPLETED
//!                             │
//!                             └──finish:error───▶ FAILED
//! ```
//!
//! A small fixed enum with an `as_str`/`Display` pair, and a dedicated
//! "not reachable from this state" error instead of silently allowing any
//! transition.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::sha256_hex_joined;
use crate::errors::EngineError;

/// Lifecycle status of a [`StageRun`]. See module docs for the transition
/// diagram.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageRunStatus::Pending => "pending",
            StageRunStatus::Running => "running",
            StageRunStatus::Completed => "completed",
            StageRunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageRunStatus::Completed | StageRunStatus::Failed)
    }

    /// Validate and perform a status transition. Only PENDING may become
    /// RUNNING; only RUNNING may become COMPLETED/FAILED; everything else
    /// is an [`EngineError::InvalidTransition`].
    pub fn transition(&self, to: StageRunStatus) -> Result<StageRunStatus, EngineError> {
        let allowed = matches!(
            (self, to),
            (StageRunStatus::Pending, StageRunStatus::Running)
                | (StageRunStatus::Running, StageRunStatus::Completed)
                | (StageRunStatus::Running, StageRunStatus::Failed)
        );
        if allowed {
            Ok(to)
        } else {
            Err(EngineError::invalid_transition(self, to))
        }
    }
}

impl fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content-addressable invocation record (§3, §4.5). The primary key,
/// `id`, is a pure function of `(parent_id, commit_hash, workflow_file,
/// stage_name, arguments)` — see [`StageRun::compute_id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRun {
    pub id: String,
    pub parent_id: Option<String>,
    pub repo_name: String,
    pub commit_hash: String,
    pub workflow_file: String,
    pub stage_name: String,
    /// Canonical JSON string of the arguments object (always present; the
    /// empty-arguments case is serialized as `"{}"`).
    pub arguments: String,
    pub status: StageRunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_value: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub triggered_by: Option<String>,
    pub trigger_event: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether this check blocks merge while unfinished (§4.7). Only
    /// meaningful for stage runs with a `trigger_event`; `true` otherwise.
    pub required: bool,
}

impl StageRun {
    /// `id = SHA256(parent_id || "|" || commit_hash || "|" || workflow_file
    ///                || "|" || stage_name || "|" || canonical_json(arguments))`
    /// where `parent_id` is the empty string if none (§3).
    pub fn compute_id(
        parent_id: Option<&str>,
        commit_hash: &str,
        workflow_file: &str,
        stage_name: &str,
        canonical_arguments: &str,
    ) -> String {
        sha256_hex_joined(&[
            parent_id.unwrap_or(""),
            commit_hash,
            workflow_file,
            stage_name,
            canonical_arguments,
        ])
    }

    pub fn new(
        parent_id: Option<String>,
        repo_name: String,
        commit_hash: String,
        workflow_file: String,
        stage_name: String,
        canonical_arguments: String,
        triggered_by: Option<String>,
        trigger_event: Option<String>,
        required: bool,
    ) -> Self {
        let id = Self::compute_id(
            parent_id.as_deref(),
            &commit_hash,
            &workflow_file,
            &stage_name,
            &canonical_arguments,
        );
        let now = Utc::now();
        Self {
            id,
            parent_id,
            repo_name,
            commit_hash,
            workflow_file,
            stage_name,
            arguments: canonical_arguments,
            status: StageRunStatus::Pending,
            started_at: None,
            completed_at: None,
            result_value: None,
            error_message: None,
            triggered_by,
            trigger_event,
            created_at: now,
            updated_at: now,
            required,
        }
    }

    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }
}

/// A named output of an invocation. `id = SHA256(stage_run_id "|"
/// file_path)` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFile {
    pub id: String,
    pub stage_run_id: String,
    pub file_path: String,
    pub content_hash: String,
    pub storage_key: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

impl StageFile {
    pub fn compute_id(stage_run_id: &str, file_path: &str) -> String {
        sha256_hex_joined(&[stage_run_id, file_path])
    }

    pub fn new(stage_run_id: String, file_path: String, content_hash: String, storage_key: String, size: i64) -> Self {
        let id = Self::compute_id(&stage_run_id, &file_path);
        Self {
            id,
            stage_run_id,
            file_path,
            content_hash,
            storage_key,
            size,
            created_at: Utc::now(),
        }
    }

    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }
}

/// `{auto id, stage_run_id, log_line_index, timestamp, log_contents}`.
/// Indices are dense and monotonically increasing per `stage_run_id` (I6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLogLine {
    pub stage_run_id: String,
    pub log_line_index: i64,
    pub timestamp: DateTime<Utc>,
    pub log_contents: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_id_matches_spec_scenario_1() {
        // f(commit=C, file=w.py, stage=main, args={}) -> SHA256("|C|w.py|main|{}")
        let id = StageRun::compute_id(None, "C", "w.py", "main", "{}");
        assert_eq!(id, crate::canonical::sha256_hex(b"|C|w.py|main|{}"));
    }

    #[test]
    fn compute_id_matches_spec_scenario_2_parent_chain() {
        let root = StageRun::compute_id(None, "C", "w.py", "main", "{}");
        let child = StageRun::compute_id(Some(&root), "C", "w.py", "sub", "{}");
        assert_eq!(
            child,
            crate::canonical::sha256_hex(format!("{root}|C|w.py|sub|{{}}").as_bytes())
        );
    }

    #[test]
    fn status_transitions_are_guarded() {
        assert_eq!(
            StageRunStatus::Pending.transition(StageRunStatus::Running).unwrap(),
            StageRunStatus::Running
        );
        assert!(StageRunStatus::Pending.transition(StageRunStatus::Completed).is_err());
        assert!(StageRunStatus::Completed.transition(StageRunStatus::Running).is_err());
        assert!(StageRunStatus::Running.transition(StageRunStatus::Failed).is_ok());
    }

    #[test]
    fn stage_file_id_is_deterministic() {
        let a = StageFile::compute_id("run1", "out.txt");
        let b = StageFile::compute_id("run1", "out.txt");
        assert_eq!(a, b);
    }
}
