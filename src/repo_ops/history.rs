//! Commit history and per-path history (§4.2, §4.3).

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::diff::diff_trees;
use crate::errors::EngineError;
use crate::model::{Commit, TreeEntry};

/// Linear parent walk, newest first (§4.2).
pub async fn get_commit_history(db: &DatabaseConnection, repository_id: Uuid, head: &str, limit: usize) -> Result<Vec<Commit>, EngineError> {
    let mut history = Vec::new();
    let mut cursor = Some(head.to_string());
    while let Some(hash) = cursor {
        if history.len() >= limit {
            break;
        }
        let commit = match super::get_commit(db, repository_id, &hash).await? {
            Some(c) => c,
            None => break,
        };
        cursor = commit.parent_hash.clone();
        history.push(commit);
    }
    Ok(history)
}

/// Defined by the diff between `commit` and its parent touching any file
/// whose path equals, or begins with, `path + "/"` (§4.2's
/// "performance-shaped detail").
pub async fn commit_affects_path(db: &DatabaseConnection, repository_id: Uuid, commit_hash: &str, path: &str) -> Result<bool, EngineError> {
    let commit = super::get_commit(db, repository_id, commit_hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("commit {commit_hash}")))?;
    let Some(parent_hash) = commit.parent_hash.clone() else {
        // initial commit: every reachable leaf is `Added` (§8 boundary behaviour).
        return path_exists_in_tree(db, repository_id, &commit.tree_hash, path).await;
    };
    let events = diff_trees(db, repository_id, Some(&parent_hash), &commit.tree_hash).await?;
    let prefix = format!("{path}/");
    Ok(events.iter().any(|e| {
        let p = e.path();
        p == path || p.starts_with(&prefix)
    }))
}

async fn path_exists_in_tree(db: &DatabaseConnection, repository_id: Uuid, tree_hash: &str, path: &str) -> Result<bool, EngineError> {
    Ok(super::get_blob_hash_from_path(db, repository_id, tree_hash, path)
        .await?
        .is_some()
        || path.is_empty())
}

/// Segmented walk to the tree at `path` (empty path means the root), mirroring
/// `get_blob_hash_from_path`'s walk but stopping one `EntryKind` short.
async fn get_tree_hash_at_path(db: &DatabaseConnection, repository_id: Uuid, root_tree_hash: &str, path: &str) -> Result<Option<String>, EngineError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut current = root_tree_hash.to_string();
    for segment in segments {
        let tree = match super::get_tree(db, repository_id, &current).await? {
            Some(t) => t,
            None => return Ok(None),
        };
        match tree.entry(segment) {
            Some(e) if e.kind == crate::model::EntryKind::Tree => current = e.target_hash.clone(),
            _ => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Lists `dir_path`'s entries as of `commit_hash`, paired with the most
/// recent ancestor commit (within `history_limit` commits) that touched each
/// entry's full path (§4.2's `get_tree_entries_with_commits`).
pub async fn get_tree_entries_with_commits(
    db: &DatabaseConnection,
    repository_id: Uuid,
    commit_hash: &str,
    dir_path: &str,
    history_limit: usize,
) -> Result<Vec<(TreeEntry, Option<Commit>)>, EngineError> {
    let commit = super::get_commit(db, repository_id, commit_hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("commit {commit_hash}")))?;
    let dir_tree_hash = get_tree_hash_at_path(db, repository_id, &commit.tree_hash, dir_path)
        .await?
        .ok_or_else(|| EngineError::PathNotFound(dir_path.to_string()))?;
    let tree = super::get_tree(db, repository_id, &dir_tree_hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("tree {dir_tree_hash}")))?;

    let mut results = Vec::with_capacity(tree.entries.len());
    for entry in tree.entries {
        let entry_path = if dir_path.is_empty() {
            entry.name.clone()
        } else {
            format!("{dir_path}/{}", entry.name)
        };
        let latest = get_latest_commit_for_path(db, repository_id, commit_hash, &entry_path, history_limit).await?;
        results.push((entry, latest));
    }
    Ok(results)
}

/// Linearly walks parents and returns the first commit (starting at `head`)
/// whose diff-to-parent affects `path` (§4.3).
pub async fn get_latest_commit_for_path(db: &DatabaseConnection, repository_id: Uuid, head: &str, path: &str, limit: usize) -> Result<Option<Commit>, EngineError> {
    let history = get_commit_history(db, repository_id, head, limit).await?;
    for commit in history {
        if commit_affects_path(db, repository_id, &commit.hash, path).await? {
            return Ok(Some(commit));
        }
    }
    Ok(None)
}
