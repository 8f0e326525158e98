//! Request/response bodies for the HTTP control plane (§6.1). Kept separate
//! from the handlers so the wire shapes (which name fields like
//! `function_name` and `invocation_id`, not the Rust-side `stage_name`/`id`)
//! don't leak into the rest of the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::{PullRequest, PullRequestComment, Repository, StageLogLine, StageRun};

#[derive(Debug, Deserialize)]
pub struct CreateRepositoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepositoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub main_branch: String,
    pub created_at: DateTime<Utc>,
}

impl From<Repository> for RepositoryResponse {
    fn from(r: Repository) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            main_branch: r.main_branch,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub caller_id: Option<String>,
    pub function_name: String,
    pub arguments: Value,
    pub repo_name: String,
    pub commit_hash: String,
    pub workflow_file: String,
}

#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ListCallsResponse {
    pub calls: Vec<CallSummaryResponse>,
}

#[derive(Debug, Serialize)]
pub struct CallSummaryResponse {
    pub invocation_id: String,
    pub function_name: String,
    pub arguments: Value,
    pub repo_name: String,
    pub commit_hash: String,
    pub workflow_file: String,
    pub parent_id: Option<String>,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StageRun> for CallSummaryResponse {
    fn from(run: StageRun) -> Self {
        let arguments = serde_json::from_str(&run.arguments).unwrap_or(Value::Null);
        Self {
            invocation_id: run.id,
            function_name: run.stage_name,
            arguments,
            repo_name: run.repo_name,
            commit_hash: run.commit_hash,
            workflow_file: run.workflow_file,
            parent_id: run.parent_id,
            status: run.status.as_str().to_string(),
            result: run.result_value,
            error: run.error_message,
            created_at: run.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    pub worker_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FinishCallRequest {
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogEntryRequest {
    pub index: i64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AppendLogsRequest {
    pub logs: Vec<LogEntryRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub since_index: Option<i64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LogLineResponse {
    pub index: i64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl From<StageLogLine> for LogLineResponse {
    fn from(l: StageLogLine) -> Self {
        Self {
            index: l.log_line_index,
            timestamp: l.timestamp,
            content: l.log_contents,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetLogsResponse {
    pub logs: Vec<LogLineResponse>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateStageFileRequest {
    pub file_path: String,
    pub content_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    pub base_branch: String,
    pub head_branch: String,
    pub title: String,
    pub description: Option<String>,
    pub author: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub number: i64,
    pub base_branch: String,
    pub head_branch: String,
    pub title: String,
    pub description: Option<String>,
    pub author: String,
    pub status: String,
    pub merge_commit_hash: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merged_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PullRequest> for PullRequestResponse {
    fn from(pr: PullRequest) -> Self {
        Self {
            id: pr.id,
            repository_id: pr.repository_id,
            number: pr.number,
            base_branch: pr.base_branch,
            head_branch: pr.head_branch,
            title: pr.title,
            description: pr.description,
            author: pr.author,
            status: pr.status.as_str().to_string(),
            merge_commit_hash: pr.merge_commit_hash,
            merged_at: pr.merged_at,
            merged_by: pr.merged_by,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MergePullRequestRequest {
    pub merged_by: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub author: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub pull_request_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<PullRequestComment> for CommentResponse {
    fn from(c: PullRequestComment) -> Self {
        Self {
            id: c.id,
            pull_request_id: c.pull_request_id,
            author: c.author,
            body: c.body,
            created_at: c.created_at,
        }
    }
}
