//! The invocation store & dispatcher (§4.5, component F).
//!
//! `StageRun`s are content-addressed: `create_call` is "insert if absent,
//! else return existing" (§9), so re-dispatching the same `(parent, commit,
//! file, stage, args)` tuple is a no-op that attaches to the previous
//! execution. Claim is a compare-and-set on `status` at the row level.

use chrono::Utc;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::blobstore::BlobStore;
use crate::canonical::canonical_json;
use crate::db::entities::{stage_file, stage_log_line, stage_run};
use crate::errors::EngineError;
use crate::model::{StageFile, StageLogLine, StageRun, StageRunStatus};

fn row_to_stage_run(row: stage_run::Model) -> Result<StageRun, EngineError> {
    Ok(StageRun {
        id: row.id,
        parent_id: row.parent_id,
        repo_name: row.repo_name,
        commit_hash: row.commit_hash,
        workflow_file: row.workflow_file,
        stage_name: row.stage_name,
        arguments: row.arguments,
        status: parse_status(&row.status)?,
        started_at: row.started_at,
        completed_at: row.completed_at,
        result_value: row.result_value,
        error_message: row.error_message,
        triggered_by: row.triggered_by,
        trigger_event: row.trigger_event,
        created_at: row.created_at,
        updated_at: row.updated_at,
        required: row.required,
    })
}

fn parse_status(s: &str) -> Result<StageRunStatus, EngineError> {
    match s {
        "pending" => Ok(StageRunStatus::Pending),
        "running" => Ok(StageRunStatus::Running),
        "completed" => Ok(StageRunStatus::Completed),
        "failed" => Ok(StageRunStatus::Failed),
        other => Err(EngineError::InvalidInput(format!("unknown stage run status: {other}"))),
    }
}

/// Create (or deduplicate) an invocation (§4.5, §6.1 `POST /api/call`).
/// `arguments` is serialized to canonical JSON before hashing, so callers
/// never need to pre-canonicalise it themselves.
#[allow(clippy::too_many_arguments)]
pub async fn create_call(
    db: &DatabaseConnection,
    parent_id: Option<String>,
    repo_name: String,
    commit_hash: String,
    workflow_file: String,
    stage_name: String,
    arguments: &serde_json::Value,
    triggered_by: Option<String>,
    trigger_event: Option<String>,
    required: bool,
) -> Result<StageRun, EngineError> {
    let canonical_arguments = canonical_json(arguments)?;
    let id = StageRun::compute_id(parent_id.as_deref(), &commit_hash, &workflow_file, &stage_name, &canonical_arguments);

    if let Some(existing) = get_call(db, &id).await? {
        return Ok(existing);
    }

    let run = StageRun::new(
        parent_id,
        repo_name,
        commit_hash,
        workflow_file,
        stage_name,
        canonical_arguments,
        triggered_by,
        trigger_event,
        required,
    );

    stage_run::Entity::insert(stage_run::ActiveModel {
        id: Set(run.id.clone()),
        parent_id: Set(run.parent_id.clone()),
        repo_name: Set(run.repo_name.clone()),
        commit_hash: Set(run.commit_hash.clone()),
        workflow_file: Set(run.workflow_file.clone()),
        stage_name: Set(run.stage_name.clone()),
        arguments: Set(run.arguments.clone()),
        status: Set(run.status.as_str().to_string()),
        started_at: Set(None),
        completed_at: Set(None),
        result_value: Set(None),
        error_message: Set(None),
        triggered_by: Set(run.triggered_by.clone()),
        trigger_event: Set(run.trigger_event.clone()),
        created_at: Set(run.created_at),
        updated_at: Set(run.updated_at),
        required: Set(run.required),
    })
    .on_conflict(sea_orm::sea_query::OnConflict::column(stage_run::Column::Id).do_nothing().to_owned())
    .exec(db)
    .await
    .ok();

    Ok(get_call(db, &run.id).await?.unwrap_or(run))
}

pub async fn get_call(db: &DatabaseConnection, id: &str) -> Result<Option<StageRun>, EngineError> {
    match stage_run::Entity::find_by_id(id.to_string()).one(db).await? {
        Some(row) => Ok(Some(row_to_stage_run(row)?)),
        None => Ok(None),
    }
}

/// `GET /api/calls?status=pending&limit=N` — oldest pending rows first
/// (§4.5's "no priority or fairness beyond creation order").
pub async fn list_calls(db: &DatabaseConnection, status: Option<StageRunStatus>, limit: u64) -> Result<Vec<StageRun>, EngineError> {
    let mut query = stage_run::Entity::find();
    if let Some(status) = status {
        query = query.filter(stage_run::Column::Status.eq(status.as_str()));
    }
    let rows = query.order_by_asc(stage_run::Column::CreatedAt).limit(limit).all(db).await?;
    rows.into_iter().map(row_to_stage_run).collect()
}

/// All `StageRun`s sharing a `trigger_event` (§4.7's per-PR check list).
pub async fn list_calls_by_trigger_event(db: &DatabaseConnection, trigger_event: &str) -> Result<Vec<StageRun>, EngineError> {
    let rows = stage_run::Entity::find()
        .filter(stage_run::Column::TriggerEvent.eq(trigger_event.to_string()))
        .order_by_asc(stage_run::Column::CreatedAt)
        .all(db)
        .await?;
    rows.into_iter().map(row_to_stage_run).collect()
}

/// Claim: compare-and-set `Pending -> Running`. Returns
/// `EngineError::InvalidTransition` if the row is not currently `Pending`
/// (the caller maps this to `409` — §6.1, §8 "claim race").
pub async fn start_call(db: &DatabaseConnection, id: &str, worker_id: &str) -> Result<StageRun, EngineError> {
    let row = stage_run::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("stage run {id}")))?;
    let current = parse_status(&row.status)?;
    current.transition(StageRunStatus::Running)?;

    let now = Utc::now();
    // CAS at the row level: the `status = 'pending'` predicate in the
    // UPDATE means a losing concurrent claimant affects zero rows.
    let result = stage_run::Entity::update_many()
        .col_expr(stage_run::Column::Status, sea_orm::sea_query::Expr::value(StageRunStatus::Running.as_str()))
        .col_expr(stage_run::Column::StartedAt, sea_orm::sea_query::Expr::value(now))
        .col_expr(stage_run::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
        .col_expr(stage_run::Column::TriggeredBy, sea_orm::sea_query::Expr::value(Some(worker_id.to_string())))
        .filter(stage_run::Column::Id.eq(id.to_string()))
        .filter(stage_run::Column::Status.eq(StageRunStatus::Pending.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(EngineError::invalid_transition(current, StageRunStatus::Running));
    }

    get_call(db, id).await?.ok_or_else(|| EngineError::not_found(format!("stage run {id}")))
}

pub enum FinishOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

/// Terminal transition: `Running -> Completed|Failed`. `409`/`InvalidTransition`
/// if the row is not currently `Running` (§7 "idempotent-on-effect": a repeat
/// finish on an already-terminal row is a conflict, not a crash).
pub async fn finish_call(db: &DatabaseConnection, id: &str, outcome: FinishOutcome) -> Result<StageRun, EngineError> {
    let row = stage_run::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("stage run {id}")))?;
    let current = parse_status(&row.status)?;
    let target = match &outcome {
        FinishOutcome::Completed(_) => StageRunStatus::Completed,
        FinishOutcome::Failed(_) => StageRunStatus::Failed,
    };
    current.transition(target)?;

    let mut active: stage_run::ActiveModel = row.into();
    active.status = Set(target.as_str().to_string());
    active.completed_at = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    match outcome {
        FinishOutcome::Completed(value) => active.result_value = Set(Some(value)),
        FinishOutcome::Failed(message) => active.error_message = Set(Some(message)),
    }
    let updated = stage_run::Entity::update(active).exec(db).await?;
    row_to_stage_run(updated)
}

/// Append a batch of log lines (§4.6's "batches every ≥1s or ≥10 lines").
/// Indices are caller-assigned and must already be dense per `stage_run_id`
/// (I6); this function does not renumber them.
pub async fn append_logs(db: &DatabaseConnection, stage_run_id: &str, logs: &[StageLogLine]) -> Result<usize, EngineError> {
    for line in logs {
        stage_log_line::Entity::insert(stage_log_line::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            stage_run_id: Set(stage_run_id.to_string()),
            log_line_index: Set(line.log_line_index),
            timestamp: Set(line.timestamp),
            log_contents: Set(line.log_contents.clone()),
        })
        .exec(db)
        .await?;
    }
    Ok(logs.len())
}

/// `GET …/logs?since_index=k&limit=N` — ascending by index, with `has_more`.
pub async fn get_logs(
    db: &DatabaseConnection,
    stage_run_id: &str,
    since_index: i64,
    limit: u64,
) -> Result<(Vec<StageLogLine>, bool), EngineError> {
    let mut rows = stage_log_line::Entity::find()
        .filter(stage_log_line::Column::StageRunId.eq(stage_run_id.to_string()))
        .filter(stage_log_line::Column::LogLineIndex.gt(since_index))
        .order_by_asc(stage_log_line::Column::LogLineIndex)
        .limit(limit + 1)
        .all(db)
        .await?;

    let has_more = rows.len() as u64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }
    let logs = rows
        .into_iter()
        .map(|r| StageLogLine {
            stage_run_id: r.stage_run_id,
            log_line_index: r.log_line_index,
            timestamp: r.timestamp,
            log_contents: r.log_contents,
        })
        .collect();
    Ok((logs, has_more))
}

/// `POST /api/stages/{id}/files` — store bytes, create the `StageFile` row
/// (§3, §4.6's `write_file`).
pub async fn create_stage_file(
    db: &DatabaseConnection,
    store: &dyn BlobStore,
    stage_run_id: &str,
    file_path: &str,
    bytes: &[u8],
) -> Result<StageFile, EngineError> {
    let id = StageFile::compute_id(stage_run_id, file_path);
    if let Some(existing) = get_stage_file(db, &id).await? {
        return Ok(existing);
    }

    let stored = store.store(bytes).await?;
    let file = StageFile::new(stage_run_id.to_string(), file_path.to_string(), stored.hash, stored.storage_key, stored.size);

    stage_file::Entity::insert(stage_file::ActiveModel {
        id: Set(file.id.clone()),
        stage_run_id: Set(file.stage_run_id.clone()),
        file_path: Set(file.file_path.clone()),
        content_hash: Set(file.content_hash.clone()),
        storage_key: Set(file.storage_key.clone()),
        size: Set(file.size),
        created_at: Set(file.created_at),
    })
    .on_conflict(sea_orm::sea_query::OnConflict::column(stage_file::Column::Id).do_nothing().to_owned())
    .exec(db)
    .await
    .ok();

    Ok(get_stage_file(db, &file.id).await?.unwrap_or(file))
}

pub async fn get_stage_file(db: &DatabaseConnection, id: &str) -> Result<Option<StageFile>, EngineError> {
    Ok(stage_file::Entity::find_by_id(id.to_string()).one(db).await?.map(|r| StageFile {
        id: r.id,
        stage_run_id: r.stage_run_id,
        file_path: r.file_path,
        content_hash: r.content_hash,
        storage_key: r.storage_key,
        size: r.size,
        created_at: r.created_at,
    }))
}

pub async fn get_stage_file_by_path(db: &DatabaseConnection, stage_run_id: &str, file_path: &str) -> Result<Option<StageFile>, EngineError> {
    get_stage_file(db, &StageFile::compute_id(stage_run_id, file_path)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_round_trips_as_str() {
        for status in [StageRunStatus::Pending, StageRunStatus::Running, StageRunStatus::Completed, StageRunStatus::Failed] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_status("bogus").is_err());
    }
}
