//! The HTTP control plane (§6.1, component K).
//!
//! State is shared via `State<Arc<AppState>>`, path/query extraction via
//! `Path`/`Query`, and `IntoResponse` is built from plain tuples rather than a
//! framework-specific response builder. `EngineError` gets its own
//! `IntoResponse` impl (§7) so every handler can just propagate with `?`.

mod dto;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use serde_json::json;
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::checks;
use crate::dispatch;
use crate::errors::EngineError;
use crate::model::StageRunStatus;
use crate::repo_ops;

use dto::*;

/// Shared state handed to every handler (§6.1): one `Arc` per process,
/// cloned cheaply per request via `axum::extract::State`.
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn BlobStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/repos/{repo_name}/blob/{*file_path}", get(get_blob_by_path))
        .route("/api/call", post(create_call))
        .route("/api/calls", get(list_calls))
        .route("/api/call/{id}", get(get_call))
        .route("/api/call/{id}/start", post(start_call))
        .route("/api/call/{id}/finish", post(finish_call))
        .route("/api/stages/{id}/logs", post(append_logs).get(get_logs))
        .route("/api/stages/{id}/files", post(create_stage_file))
        .route("/api/stages/{id}/files/{*file_path}", get(get_stage_file))
        .route("/api/repos", post(create_repository))
        .route("/api/repos/{repo_name}/pulls", post(create_pull_request).get(list_pull_requests))
        .route("/api/pulls/{id}", get(get_pull_request))
        .route("/api/pulls/{id}/close", post(close_pull_request))
        .route("/api/pulls/{id}/reopen", post(reopen_pull_request))
        .route("/api/pulls/{id}/merge", post(merge_pull_request))
        .route("/api/pulls/{id}/comments", post(add_comment).get(list_comments))
        .route("/api/pulls/{id}/redispatch", post(redispatch_checks))
        .route("/healthz", get(healthz))
        .with_state(state)
}

impl IntoResponse for EngineError {
    /// Maps each variant to a status code and a `{error: string}` body (§7):
    /// client faults are 4xx, storage/database faults are 5xx.
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::NotFound(_) | EngineError::PathNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::AlreadyExists(_) => StatusCode::CONFLICT,
            EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
            EngineError::PullRequestNotMergeable(_) => StatusCode::CONFLICT,
            EngineError::InvalidInput(_) | EngineError::Json(_) => StatusCode::BAD_REQUEST,
            EngineError::DependencyUnavailable(_) => StatusCode::BAD_GATEWAY,
            EngineError::StorageError(_) | EngineError::Database(_) | EngineError::Git(_) | EngineError::Io(_) | EngineError::WorkflowExecutionError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn get_blob_by_path(State(state): State<Arc<AppState>>, Path((repo_name, commit_hash_and_path)): Path<(String, String)>) -> Result<Response, EngineError> {
    // `{commit_hash}/{file_path...}` arrives as one wildcard segment.
    let (commit_hash, file_path) = commit_hash_and_path
        .split_once('/')
        .ok_or_else(|| EngineError::InvalidInput("missing file path".to_string()))?;

    let repo = repo_ops::get_repository_by_name(&state.db, &repo_name).await?.ok_or_else(|| EngineError::not_found(format!("repository {repo_name}")))?;
    let bytes = repo_ops::load_workflow_source(&state.db, &state.store, repo.id, commit_hash, file_path).await?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

async fn create_repository(State(state): State<Arc<AppState>>, Json(body): Json<CreateRepositoryRequest>) -> Result<Response, EngineError> {
    let repo = repo_ops::create_repository(&state.db, body.name, body.description).await?;
    Ok((StatusCode::CREATED, Json(RepositoryResponse::from(repo))).into_response())
}

async fn create_call(State(state): State<Arc<AppState>>, Json(body): Json<CreateCallRequest>) -> Result<Response, EngineError> {
    let run = dispatch::create_call(
        &state.db,
        body.caller_id,
        body.repo_name,
        body.commit_hash,
        body.workflow_file,
        body.function_name,
        &body.arguments,
        None,
        None,
        true,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "invocation_id": run.id }))).into_response())
}

async fn list_calls(State(state): State<Arc<AppState>>, Query(params): Query<ListCallsQuery>) -> Result<Json<ListCallsResponse>, EngineError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let limit = params.limit.unwrap_or(100);
    let calls = dispatch::list_calls(&state.db, status, limit).await?;
    Ok(Json(ListCallsResponse {
        calls: calls.into_iter().map(CallSummaryResponse::from).collect(),
    }))
}

fn parse_status(s: &str) -> Result<StageRunStatus, EngineError> {
    match s {
        "pending" => Ok(StageRunStatus::Pending),
        "running" => Ok(StageRunStatus::Running),
        "completed" => Ok(StageRunStatus::Completed),
        "failed" => Ok(StageRunStatus::Failed),
        other => Err(EngineError::InvalidInput(format!("unknown status: {other}"))),
    }
}

async fn get_call(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<CallSummaryResponse>, EngineError> {
    let run = dispatch::get_call(&state.db, &id).await?.ok_or_else(|| EngineError::not_found(format!("call {id}")))?;
    Ok(Json(CallSummaryResponse::from(run)))
}

async fn start_call(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<StartCallRequest>) -> Result<Json<CallSummaryResponse>, EngineError> {
    let run = dispatch::start_call(&state.db, &id, &body.worker_id).await?;
    Ok(Json(CallSummaryResponse::from(run)))
}

async fn finish_call(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<FinishCallRequest>) -> Result<Json<CallSummaryResponse>, EngineError> {
    let outcome = match body.status.as_str() {
        "completed" => dispatch::FinishOutcome::Completed(body.result.unwrap_or(serde_json::Value::Null)),
        "failed" => dispatch::FinishOutcome::Failed(body.error.unwrap_or_default()),
        other => return Err(EngineError::InvalidInput(format!("unknown finish status: {other}"))),
    };
    let run = dispatch::finish_call(&state.db, &id, outcome).await?;
    Ok(Json(CallSummaryResponse::from(run)))
}

async fn append_logs(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<AppendLogsRequest>) -> Result<Response, EngineError> {
    let lines: Vec<crate::model::StageLogLine> = body
        .logs
        .into_iter()
        .map(|l| crate::model::StageLogLine {
            stage_run_id: id.clone(),
            log_line_index: l.index,
            timestamp: l.timestamp,
            log_contents: l.content,
        })
        .collect();
    let count = dispatch::append_logs(&state.db, &id, &lines).await?;
    Ok((StatusCode::CREATED, Json(json!({ "count": count }))).into_response())
}

async fn get_logs(State(state): State<Arc<AppState>>, Path(id): Path<String>, Query(params): Query<LogsQuery>) -> Result<Json<GetLogsResponse>, EngineError> {
    let since_index = params.since_index.unwrap_or(-1);
    let limit = params.limit.unwrap_or(1000);
    let (logs, has_more) = dispatch::get_logs(&state.db, &id, since_index, limit).await?;
    Ok(Json(GetLogsResponse {
        logs: logs.into_iter().map(LogLineResponse::from).collect(),
        has_more,
    }))
}

async fn create_stage_file(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<CreateStageFileRequest>) -> Result<Response, EngineError> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.content_base64)
        .map_err(|e| EngineError::InvalidInput(format!("invalid base64: {e}")))?;
    let file = dispatch::create_stage_file(&state.db, state.store.as_ref(), &id, &body.file_path, &bytes).await?;
    Ok((StatusCode::CREATED, Json(json!({ "stage_file_id": file.id, "content_hash": file.content_hash }))).into_response())
}

async fn get_stage_file(State(state): State<Arc<AppState>>, Path((id, file_path)): Path<(String, String)>) -> Result<Response, EngineError> {
    let file = dispatch::get_stage_file_by_path(&state.db, &id, &file_path)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("stage file {file_path}")))?;
    let bytes = state
        .store
        .retrieve(&file.content_hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("blob {}", file.content_hash)))?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

async fn create_pull_request(State(state): State<Arc<AppState>>, Path(repo_name): Path<String>, Json(body): Json<CreatePullRequestRequest>) -> Result<Response, EngineError> {
    let repo = repo_ops::get_repository_by_name(&state.db, &repo_name).await?.ok_or_else(|| EngineError::not_found(format!("repository {repo_name}")))?;
    let (pr, checks) = checks::create_pull_request(&state.db, &state.store, repo.id, body.base_branch, body.head_branch, body.title, body.description, body.author).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "pull_request": PullRequestResponse::from(pr), "checks": checks.into_iter().map(CallSummaryResponse::from).collect::<Vec<_>>() })),
    )
        .into_response())
}

async fn list_pull_requests(State(state): State<Arc<AppState>>, Path(repo_name): Path<String>) -> Result<Json<Vec<PullRequestResponse>>, EngineError> {
    let repo = repo_ops::get_repository_by_name(&state.db, &repo_name).await?.ok_or_else(|| EngineError::not_found(format!("repository {repo_name}")))?;
    let prs = checks::list_pull_requests(&state.db, repo.id).await?;
    Ok(Json(prs.into_iter().map(PullRequestResponse::from).collect()))
}

async fn get_pull_request(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<PullRequestResponse>, EngineError> {
    let pr = checks::get_pull_request(&state.db, id).await?.ok_or_else(|| EngineError::not_found(format!("pull request {id}")))?;
    Ok(Json(PullRequestResponse::from(pr)))
}

async fn close_pull_request(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<PullRequestResponse>, EngineError> {
    Ok(Json(PullRequestResponse::from(checks::close_pull_request(&state.db, id).await?)))
}

async fn reopen_pull_request(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<PullRequestResponse>, EngineError> {
    Ok(Json(PullRequestResponse::from(checks::reopen_pull_request(&state.db, id).await?)))
}

async fn merge_pull_request(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>, Json(body): Json<MergePullRequestRequest>) -> Result<Json<PullRequestResponse>, EngineError> {
    let pr = checks::merge_pull_request(&state.db, id, body.merged_by).await?;
    Ok(Json(PullRequestResponse::from(pr)))
}

async fn add_comment(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>, Json(body): Json<AddCommentRequest>) -> Result<Response, EngineError> {
    let comment = checks::add_comment(&state.db, id, body.author, body.body).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))).into_response())
}

async fn list_comments(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Vec<CommentResponse>>, EngineError> {
    let comments = checks::list_comments(&state.db, id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

async fn redispatch_checks(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Vec<CallSummaryResponse>>, EngineError> {
    let runs = checks::redispatch_checks(&state.db, &state.store, id).await?;
    Ok(Json(runs.into_iter().map(CallSummaryResponse::from).collect()))
}

/// `GET /healthz` (§6.1 expansion) — liveness probe, not tied to any excluded
/// feature: every long-running axum service in this ecosystem carries one
/// regardless of which domain features are in or out of scope.
async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let db_ok = state.db.execute(Statement::from_string(state.db.get_database_backend(), "SELECT 1")).await.is_ok();
    let status = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "status": if db_ok { "ok" } else { "degraded" }, "db": db_ok }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_rejects_unknown() {
        assert!(parse_status("bogus").is_err());
        assert!(parse_status("pending").is_ok());
    }
}
