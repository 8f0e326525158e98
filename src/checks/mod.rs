//! Pull requests and the PR check engine (§4.7, component H).
//!
//! `.pr-checks.yml` is read from the PR's *base* branch, parsed with
//! `serde_yaml`. Each declared check becomes a `StageRun` bound to the PR's
//! *head* commit, grouped under one `trigger_event` string.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::db::entities::{pull_request, pull_request_comment};
use crate::dispatch;
use crate::errors::EngineError;
use crate::model::repository::Ref;
use crate::model::{PullRequest, PullRequestComment, PullRequestStatus, StageRun, StageRunStatus};

/// One entry in `.pr-checks.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    pub workflow_file: String,
    pub stage_name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub version: String,
    pub checks: Vec<CheckSpec>,
}

fn validate_check_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() || name.contains(['/', '\n', '\r', '\t']) {
        return Err(EngineError::InvalidInput(format!("invalid check name: {name:?}")));
    }
    Ok(())
}

/// Read and parse `.pr-checks.yml` from `branch`'s current head commit.
/// Returns `None` if the repo has no such file at all (a repo with no
/// check config simply has no checks).
pub async fn load_check_config(
    db: &DatabaseConnection,
    store: &Arc<dyn BlobStore>,
    repository_id: Uuid,
    branch: &str,
) -> Result<Option<CheckConfig>, EngineError> {
    let Some(commit_hash) = crate::repo_ops::get_ref(db, repository_id, &Ref::branch_name(branch)).await? else {
        return Ok(None);
    };
    let bytes = match crate::repo_ops::load_workflow_source(db, store, repository_id, &commit_hash, ".pr-checks.yml").await {
        Ok(bytes) => bytes,
        Err(EngineError::PathNotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let config: CheckConfig = serde_yaml::from_slice(&bytes).map_err(|e| EngineError::InvalidInput(format!(".pr-checks.yml: {e}")))?;
    for check in &config.checks {
        validate_check_name(&check.name)?;
    }
    Ok(Some(config))
}

fn row_to_pull_request(row: pull_request::Model) -> Result<PullRequest, EngineError> {
    Ok(PullRequest {
        id: row.id,
        repository_id: row.repository_id,
        number: row.number,
        base_branch: row.base_branch,
        head_branch: row.head_branch,
        title: row.title,
        description: row.description,
        author: row.author,
        status: parse_pr_status(&row.status)?,
        merge_commit_hash: row.merge_commit_hash,
        merged_at: row.merged_at,
        merged_by: row.merged_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn parse_pr_status(s: &str) -> Result<PullRequestStatus, EngineError> {
    match s {
        "OPEN" => Ok(PullRequestStatus::Open),
        "CLOSED" => Ok(PullRequestStatus::Closed),
        "MERGED" => Ok(PullRequestStatus::Merged),
        other => Err(EngineError::InvalidInput(format!("unknown PR status: {other}"))),
    }
}

async fn next_pr_number(db: &DatabaseConnection, repository_id: Uuid) -> Result<i64, EngineError> {
    let max = pull_request::Entity::find()
        .filter(pull_request::Column::RepositoryId.eq(repository_id))
        .order_by_desc(pull_request::Column::Number)
        .one(db)
        .await?
        .map(|r| r.number)
        .unwrap_or(0);
    Ok(max + 1)
}

/// Create a PR and dispatch its initial checks (§4.7). The per-repo
/// `number` is assigned as `max(number) + 1`.
#[allow(clippy::too_many_arguments)]
pub async fn create_pull_request(
    db: &DatabaseConnection,
    store: &Arc<dyn BlobStore>,
    repository_id: Uuid,
    base_branch: String,
    head_branch: String,
    title: String,
    description: Option<String>,
    author: String,
) -> Result<(PullRequest, Vec<StageRun>), EngineError> {
    let number = next_pr_number(db, repository_id).await?;
    let pr = PullRequest::new(repository_id, number, base_branch, head_branch, title, description, author);

    pull_request::Entity::insert(pull_request::ActiveModel {
        id: Set(pr.id),
        repository_id: Set(pr.repository_id),
        number: Set(pr.number),
        base_branch: Set(pr.base_branch.clone()),
        head_branch: Set(pr.head_branch.clone()),
        title: Set(pr.title.clone()),
        description: Set(pr.description.clone()),
        author: Set(pr.author.clone()),
        status: Set(pr.status.as_str().to_string()),
        merge_commit_hash: Set(None),
        merged_at: Set(None),
        merged_by: Set(None),
        created_at: Set(pr.created_at),
        updated_at: Set(pr.updated_at),
    })
    .exec(db)
    .await?;

    let runs = dispatch_checks(db, store, &pr).await?;
    Ok((pr, runs))
}

pub async fn get_pull_request(db: &DatabaseConnection, id: Uuid) -> Result<Option<PullRequest>, EngineError> {
    match pull_request::Entity::find_by_id(id).one(db).await? {
        Some(row) => Ok(Some(row_to_pull_request(row)?)),
        None => Ok(None),
    }
}

pub async fn list_pull_requests(db: &DatabaseConnection, repository_id: Uuid) -> Result<Vec<PullRequest>, EngineError> {
    let rows = pull_request::Entity::find()
        .filter(pull_request::Column::RepositoryId.eq(repository_id))
        .order_by_desc(pull_request::Column::Number)
        .all(db)
        .await?;
    rows.into_iter().map(row_to_pull_request).collect()
}

async fn set_pr_status(db: &DatabaseConnection, id: Uuid, status: PullRequestStatus) -> Result<PullRequest, EngineError> {
    let row = pull_request::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("pull request {id}")))?;
    let mut active: pull_request::ActiveModel = row.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now());
    let updated = pull_request::Entity::update(active).exec(db).await?;
    row_to_pull_request(updated)
}

pub async fn close_pull_request(db: &DatabaseConnection, id: Uuid) -> Result<PullRequest, EngineError> {
    set_pr_status(db, id, PullRequestStatus::Closed).await
}

pub async fn reopen_pull_request(db: &DatabaseConnection, id: Uuid) -> Result<PullRequest, EngineError> {
    set_pr_status(db, id, PullRequestStatus::Open).await
}

pub async fn add_comment(db: &DatabaseConnection, pull_request_id: Uuid, author: String, body: String) -> Result<PullRequestComment, EngineError> {
    let comment = PullRequestComment::new(pull_request_id, author, body);
    pull_request_comment::Entity::insert(pull_request_comment::ActiveModel {
        id: Set(comment.id),
        pull_request_id: Set(comment.pull_request_id),
        author: Set(comment.author.clone()),
        body: Set(comment.body.clone()),
        created_at: Set(comment.created_at),
    })
    .exec(db)
    .await?;
    Ok(comment)
}

pub async fn list_comments(db: &DatabaseConnection, pull_request_id: Uuid) -> Result<Vec<PullRequestComment>, EngineError> {
    let rows = pull_request_comment::Entity::find()
        .filter(pull_request_comment::Column::PullRequestId.eq(pull_request_id))
        .order_by_asc(pull_request_comment::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| PullRequestComment {
            id: r.id,
            pull_request_id: r.pull_request_id,
            author: r.author,
            body: r.body,
            created_at: r.created_at,
        })
        .collect())
}

/// This PR's checks: every `StageRun` sharing its `trigger_event` (§4.7).
pub async fn list_checks_for_pr(db: &DatabaseConnection, pr: &PullRequest) -> Result<Vec<StageRun>, EngineError> {
    dispatch::list_calls_by_trigger_event(db, &pr.trigger_event()).await
}

/// Read `.pr-checks.yml` from the base branch and create a `StageRun` per
/// declared check, bound to the PR's current head commit (§4.7). Content
/// addressing (I1) makes repeat dispatch against an unchanged head commit a
/// no-op.
pub async fn dispatch_checks(db: &DatabaseConnection, store: &Arc<dyn BlobStore>, pr: &PullRequest) -> Result<Vec<StageRun>, EngineError> {
    let Some(config) = load_check_config(db, store, pr.repository_id, &pr.base_branch).await? else {
        return Ok(Vec::new());
    };
    let head_commit = crate::repo_ops::get_ref(db, pr.repository_id, &Ref::branch_name(&pr.head_branch))
        .await?
        .ok_or_else(|| EngineError::not_found(format!("branch {}", pr.head_branch)))?;

    let mut runs = Vec::with_capacity(config.checks.len());
    for check in &config.checks {
        let run = dispatch::create_call(
            db,
            None,
            repo_name_for(db, pr.repository_id).await?,
            head_commit.clone(),
            check.workflow_file.clone(),
            check.stage_name.clone(),
            &check.arguments.clone().unwrap_or(serde_json::Value::Null),
            None,
            Some(pr.trigger_event()),
            check.required,
        )
        .await?;
        runs.push(run);
    }
    Ok(runs)
}

/// Re-read `.pr-checks.yml` and re-derive `StageRun`s against the PR's
/// *current* head commit (§4.7 "Re-dispatch").
pub async fn redispatch_checks(db: &DatabaseConnection, store: &Arc<dyn BlobStore>, pr_id: Uuid) -> Result<Vec<StageRun>, EngineError> {
    let pr = get_pull_request(db, pr_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("pull request {pr_id}")))?;
    dispatch_checks(db, store, &pr).await
}

async fn repo_name_for(db: &DatabaseConnection, repository_id: Uuid) -> Result<String, EngineError> {
    crate::repo_ops::get_repository_name(db, repository_id).await
}

/// Merge-gate evaluation (§4.7, §8 scenario 5). A *required* check not yet
/// `Completed` blocks the merge; optional checks (`required: false` in
/// `.pr-checks.yml`) never block, however long they stay pending, running,
/// or failed. The reason string is literally `"N check(s) still running"`
/// regardless of whether the blocking checks are pending, running, or
/// failed, rather than distinguishing failure from in-progress in the
/// message text.
pub async fn can_merge_pr(db: &DatabaseConnection, pr: &PullRequest) -> Result<(bool, Option<String>), EngineError> {
    if pr.status != PullRequestStatus::Open {
        return Ok((false, Some(format!("pull request is {}", pr.status))));
    }
    let checks = list_checks_for_pr(db, pr).await?;
    let unfinished = checks.iter().filter(|c| c.required && c.status != StageRunStatus::Completed).count();
    if unfinished > 0 {
        return Ok((false, Some(format!("{unfinished} check(s) still running"))));
    }
    Ok((true, None))
}

/// Fast-forward merge, gated by [`can_merge_pr`] (§4.7, §9: no three-way
/// merge).
pub async fn merge_pull_request(db: &DatabaseConnection, pr_id: Uuid, merged_by: String) -> Result<PullRequest, EngineError> {
    let pr = get_pull_request(db, pr_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("pull request {pr_id}")))?;

    let (mergeable, reason) = can_merge_pr(db, &pr).await?;
    if !mergeable {
        return Err(EngineError::PullRequestNotMergeable(reason.unwrap_or_default()));
    }

    let merge_commit_hash = crate::repo_ops::merge_branches(db, pr.repository_id, &pr.base_branch, &pr.head_branch).await?;

    let row = pull_request::Entity::find_by_id(pr_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("pull request {pr_id}")))?;
    let mut active: pull_request::ActiveModel = row.into();
    active.status = Set(PullRequestStatus::Merged.as_str().to_string());
    active.merge_commit_hash = Set(Some(merge_commit_hash));
    active.merged_at = Set(Some(Utc::now()));
    active.merged_by = Set(Some(merged_by));
    active.updated_at = Set(Utc::now());
    let updated = pull_request::Entity::update(active).exec(db).await?;
    row_to_pull_request(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_name_rejects_path_separators_and_control_chars() {
        assert!(validate_check_name("tests").is_ok());
        assert!(validate_check_name("tests/lint").is_err());
        assert!(validate_check_name("tests\n").is_err());
        assert!(validate_check_name("").is_err());
    }

    #[test]
    fn check_config_parses_required_default() {
        let yaml = "version: \"1\"\nchecks:\n  - name: tests\n    workflow_file: w.py\n    stage_name: run_tests\n";
        let config: CheckConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.checks.len(), 1);
        assert!(config.checks[0].required);
    }
}
