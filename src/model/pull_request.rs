//! PullRequest and PullRequestComment (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Closed,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestStatus::Open => "OPEN",
            PullRequestStatus::Closed => "CLOSED",
            PullRequestStatus::Merged => "MERGED",
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `{id, repo, number (per-repo sequence), base_branch, head_branch, title,
/// description, author, status, merge_commit_hash?, merged_at?, merged_by?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub number: i64,
    pub base_branch: String,
    pub head_branch: String,
    pub title: String,
    pub description: Option<String>,
    pub author: String,
    pub status: PullRequestStatus,
    pub merge_commit_hash: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merged_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    pub fn new(
        repository_id: Uuid,
        number: i64,
        base_branch: String,
        head_branch: String,
        title: String,
        description: Option<String>,
        author: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            repository_id,
            number,
            base_branch,
            head_branch,
            title,
            description,
            author,
            status: PullRequestStatus::Open,
            merge_commit_hash: None,
            merged_at: None,
            merged_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Unique `trigger_event` string used to group this PR's check StageRuns
    /// (§4.7).
    pub fn trigger_event(&self) -> String {
        format!("pr:{}:{}", self.repository_id, self.number)
    }
}

/// A time-ordered message attached to a PR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestComment {
    pub id: Uuid,
    pub pull_request_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl PullRequestComment {
    pub fn new(pull_request_id: Uuid, author: String, body: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            pull_request_id,
            author,
            body,
            created_at: Utc::now(),
        }
    }
}
