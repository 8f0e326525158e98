//! Repository operations (§4.2, component C).
//!
//! Every function takes `&DatabaseConnection`/`&dyn BlobStore` explicitly
//! rather than reaching for a global singleton — the source's
//! `threading.local()`/module-global pattern is exactly what §9's design
//! notes say to reimplement as values carried on the caller's context.

mod history;
mod tree_sync;

pub use history::{commit_affects_path, get_commit_history, get_latest_commit_for_path, get_tree_entries_with_commits};
pub use tree_sync::{delete_file, update_file};

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::db::entities::{blob, commit, r#ref, repository, tree, tree_entry};
use crate::errors::EngineError;
use crate::model::{Blob, Commit, EntryKind, Repository, Tree, TreeEntry};

/// Create a repository; `main_branch` is always `"main"` at creation (§3).
/// Fails if `name` is already taken (the `repositories.name` column is
/// unique).
pub async fn create_repository(db: &DatabaseConnection, name: String, description: Option<String>) -> Result<Repository, EngineError> {
    if get_repository_by_name(db, &name).await?.is_some() {
        return Err(EngineError::AlreadyExists(format!("repository {name}")));
    }
    let repo = Repository::new(name, description);
    repository::Entity::insert(repository::ActiveModel {
        id: Set(repo.id),
        name: Set(repo.name.clone()),
        description: Set(repo.description.clone()),
        main_branch: Set(repo.main_branch.clone()),
        created_at: Set(repo.created_at),
    })
    .exec(db)
    .await?;
    Ok(repo)
}

fn row_to_repository(row: repository::Model) -> Repository {
    Repository {
        id: row.id,
        name: row.name,
        description: row.description,
        main_branch: row.main_branch,
        created_at: row.created_at,
    }
}

pub async fn get_repository(db: &DatabaseConnection, id: Uuid) -> Result<Option<Repository>, EngineError> {
    Ok(repository::Entity::find_by_id(id).one(db).await?.map(row_to_repository))
}

pub async fn get_repository_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<Repository>, EngineError> {
    Ok(repository::Entity::find()
        .filter(repository::Column::Name.eq(name.to_string()))
        .one(db)
        .await?
        .map(row_to_repository))
}

/// Look up a repository's name from its id — the `stage_runs` table scopes
/// rows by `repo_name` rather than `repository_id` (§3: `StageRun`s are
/// addressed the way a worker sees them, by repo name), so the VFS needs
/// this to resolve a `Blob` node's stage-run children.
pub async fn get_repository_name(db: &DatabaseConnection, repository_id: Uuid) -> Result<String, EngineError> {
    repository::Entity::find_by_id(repository_id)
        .one(db)
        .await?
        .map(|r| r.name)
        .ok_or_else(|| EngineError::not_found(format!("repository {repository_id}")))
}

/// Store bytes and upsert the `Blob` row; idempotent by hash within the
/// repository (§4.2).
pub async fn create_blob(
    db: &DatabaseConnection,
    store: &dyn BlobStore,
    repository_id: Uuid,
    bytes: &[u8],
) -> Result<Blob, EngineError> {
    let stored = store.store(bytes).await?;

    if let Some(existing) = blob::Entity::find_by_id((repository_id, stored.hash.clone()))
        .one(db)
        .await?
    {
        return Ok(Blob {
            repository_id,
            hash: existing.hash,
            size: existing.size,
            storage_key: existing.storage_key,
        });
    }

    let active = blob::ActiveModel {
        repository_id: Set(repository_id),
        hash: Set(stored.hash.clone()),
        size: Set(stored.size),
        storage_key: Set(stored.storage_key.clone()),
    };
    blob::Entity::insert(active)
        .on_conflict(
            sea_orm::sea_query::OnConflict::columns([blob::Column::RepositoryId, blob::Column::Hash])
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await
        .ok();

    Ok(Blob {
        repository_id,
        hash: stored.hash,
        size: stored.size,
        storage_key: stored.storage_key,
    })
}

pub async fn get_blob(db: &DatabaseConnection, repository_id: Uuid, hash: &str) -> Result<Option<Blob>, EngineError> {
    Ok(blob::Entity::find_by_id((repository_id, hash.to_string()))
        .one(db)
        .await?
        .map(|m| Blob {
            repository_id: m.repository_id,
            hash: m.hash,
            size: m.size,
            storage_key: m.storage_key,
        }))
}

/// Sort by name, reject duplicate names, upsert `Tree` + `TreeEntry` rows in
/// one transaction (§4.2).
pub async fn create_tree(db: &DatabaseConnection, repository_id: Uuid, entries: Vec<TreeEntry>) -> Result<Tree, EngineError> {
    let tree = Tree::new(repository_id, entries)?;

    if tree::Entity::find_by_id((repository_id, tree.hash.clone())).one(db).await?.is_some() {
        return Ok(tree);
    }

    let txn = db.begin().await?;
    tree::Entity::insert(tree::ActiveModel {
        repository_id: Set(repository_id),
        hash: Set(tree.hash.clone()),
    })
    .on_conflict(
        sea_orm::sea_query::OnConflict::columns([tree::Column::RepositoryId, tree::Column::Hash])
            .do_nothing()
            .to_owned(),
    )
    .exec(&txn)
    .await
    .ok();

    for entry in &tree.entries {
        tree_entry::Entity::insert(tree_entry::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            repository_id: Set(repository_id),
            tree_hash: Set(tree.hash.clone()),
            name: Set(entry.name.clone()),
            kind: Set(entry.kind.as_str().to_string()),
            target_hash: Set(entry.target_hash.clone()),
            mode: Set(entry.mode.clone()),
        })
        .on_conflict(
            sea_orm::sea_query::OnConflict::columns([
                tree_entry::Column::RepositoryId,
                tree_entry::Column::TreeHash,
                tree_entry::Column::Name,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec(&txn)
        .await
        .ok();
    }
    txn.commit().await?;

    Ok(tree)
}

pub async fn get_tree(db: &DatabaseConnection, repository_id: Uuid, hash: &str) -> Result<Option<Tree>, EngineError> {
    if tree::Entity::find_by_id((repository_id, hash.to_string())).one(db).await?.is_none() {
        return Ok(None);
    }
    let rows = tree_entry::Entity::find()
        .filter(tree_entry::Column::RepositoryId.eq(repository_id))
        .filter(tree_entry::Column::TreeHash.eq(hash))
        .all(db)
        .await?;
    let mut entries: Vec<TreeEntry> = rows
        .into_iter()
        .map(|r| TreeEntry {
            name: r.name,
            kind: if r.kind == "TREE" { EntryKind::Tree } else { EntryKind::Blob },
            target_hash: r.target_hash,
            mode: r.mode,
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Some(Tree {
        repository_id,
        hash: hash.to_string(),
        entries,
    }))
}

/// Idempotent by computed hash (§4.2).
#[allow(clippy::too_many_arguments)]
pub async fn create_commit(
    db: &DatabaseConnection,
    repository_id: Uuid,
    tree_hash: String,
    message: String,
    author: String,
    author_email: String,
    parent_hash: Option<String>,
) -> Result<Commit, EngineError> {
    let commit_obj = Commit::new(repository_id, tree_hash, parent_hash, author, author_email, message, Utc::now())?;

    if commit::Entity::find_by_id((repository_id, commit_obj.hash.clone())).one(db).await?.is_some() {
        return Ok(commit_obj);
    }

    commit::Entity::insert(commit::ActiveModel {
        repository_id: Set(repository_id),
        hash: Set(commit_obj.hash.clone()),
        tree_hash: Set(commit_obj.tree_hash.clone()),
        parent_hash: Set(commit_obj.parent_hash.clone()),
        author: Set(commit_obj.author.clone()),
        author_email: Set(commit_obj.author_email.clone()),
        message: Set(commit_obj.message.clone()),
        committed_at: Set(commit_obj.committed_at),
    })
    .on_conflict(
        sea_orm::sea_query::OnConflict::columns([commit::Column::RepositoryId, commit::Column::Hash])
            .do_nothing()
            .to_owned(),
    )
    .exec(db)
    .await
    .ok();

    Ok(commit_obj)
}

pub async fn get_commit(db: &DatabaseConnection, repository_id: Uuid, hash: &str) -> Result<Option<Commit>, EngineError> {
    Ok(commit::Entity::find_by_id((repository_id, hash.to_string()))
        .one(db)
        .await?
        .map(|m| Commit {
            repository_id: m.repository_id,
            hash: m.hash,
            tree_hash: m.tree_hash,
            parent_hash: m.parent_hash,
            author: m.author,
            author_email: m.author_email,
            message: m.message,
            committed_at: m.committed_at,
        }))
}

/// Upsert, no ordering check — accepts any commit (§4.2).
pub async fn create_or_update_ref(db: &DatabaseConnection, repository_id: Uuid, name: &str, commit_hash: &str) -> Result<(), EngineError> {
    let existing = r#ref::Entity::find_by_id((repository_id, name.to_string())).one(db).await?;
    match existing {
        Some(row) => {
            let mut active: r#ref::ActiveModel = row.into();
            active.commit_hash = Set(commit_hash.to_string());
            r#ref::Entity::update(active).exec(db).await?;
        }
        None => {
            r#ref::Entity::insert(r#ref::ActiveModel {
                repository_id: Set(repository_id),
                name: Set(name.to_string()),
                commit_hash: Set(commit_hash.to_string()),
            })
            .exec(db)
            .await?;
        }
    }
    Ok(())
}

/// Create-only — fails if the ref already exists (§4.2).
pub async fn create_branch(db: &DatabaseConnection, repository_id: Uuid, name: &str, commit_hash: &str) -> Result<(), EngineError> {
    let ref_name = crate::model::repository::Ref::branch_name(name);
    if r#ref::Entity::find_by_id((repository_id, ref_name.clone())).one(db).await?.is_some() {
        return Err(EngineError::AlreadyExists(format!("branch {name}")));
    }
    r#ref::Entity::insert(r#ref::ActiveModel {
        repository_id: Set(repository_id),
        name: Set(ref_name),
        commit_hash: Set(commit_hash.to_string()),
    })
    .exec(db)
    .await?;
    Ok(())
}

pub async fn get_ref(db: &DatabaseConnection, repository_id: Uuid, name: &str) -> Result<Option<String>, EngineError> {
    Ok(r#ref::Entity::find_by_id((repository_id, name.to_string()))
        .one(db)
        .await?
        .map(|m| m.commit_hash))
}

/// Try `refs/heads/<token>` then `refs/tags/<token>` then raw commit hash
/// (§4.2; see DESIGN.md for why tags are tried before a raw hash).
pub async fn resolve_ref_or_commit(db: &DatabaseConnection, repository_id: Uuid, token: &str) -> Result<Option<String>, EngineError> {
    if let Some(hash) = get_ref(db, repository_id, &crate::model::repository::Ref::branch_name(token)).await? {
        return Ok(Some(hash));
    }
    if let Some(hash) = get_ref(db, repository_id, &crate::model::repository::Ref::tag_name(token)).await? {
        return Ok(Some(hash));
    }
    if get_commit(db, repository_id, token).await?.is_some() {
        return Ok(Some(token.to_string()));
    }
    Ok(None)
}

/// Segmented walk; `None` at any missing segment or type mismatch (§4.2).
pub async fn get_blob_hash_from_path(db: &DatabaseConnection, repository_id: Uuid, tree_hash: &str, path: &str) -> Result<Option<String>, EngineError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(None);
    }
    let mut current_tree = tree_hash.to_string();
    for (i, segment) in segments.iter().enumerate() {
        let tree = match get_tree(db, repository_id, &current_tree).await? {
            Some(t) => t,
            None => return Ok(None),
        };
        let entry = match tree.entry(segment) {
            Some(e) => e,
            None => return Ok(None),
        };
        let is_last = i == segments.len() - 1;
        match (is_last, entry.kind) {
            (true, EntryKind::Blob) => return Ok(Some(entry.target_hash.clone())),
            (false, EntryKind::Tree) => current_tree = entry.target_hash.clone(),
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// Fast-forward-only: advance `base` to `head`'s commit hash (§4.2, §9: no
/// three-way merge is a recorded open question, not a bug).
pub async fn merge_branches(db: &DatabaseConnection, repository_id: Uuid, base_branch: &str, head_branch: &str) -> Result<String, EngineError> {
    let head_hash = get_ref(db, repository_id, &crate::model::repository::Ref::branch_name(head_branch))
        .await?
        .ok_or_else(|| EngineError::not_found(format!("branch {head_branch}")))?;
    create_or_update_ref(db, repository_id, &crate::model::repository::Ref::branch_name(base_branch), &head_hash).await?;
    Ok(head_hash)
}

/// Shared by the worker and the HTTP layer: load a workflow file's bytes at
/// `(repo, commit, workflow_file)`.
pub async fn load_workflow_source(
    db: &DatabaseConnection,
    store: &Arc<dyn BlobStore>,
    repository_id: Uuid,
    commit_hash: &str,
    workflow_file: &str,
) -> Result<Vec<u8>, EngineError> {
    let commit = get_commit(db, repository_id, commit_hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("commit {commit_hash}")))?;
    let blob_hash = get_blob_hash_from_path(db, repository_id, &commit.tree_hash, workflow_file)
        .await?
        .ok_or_else(|| EngineError::PathNotFound(workflow_file.to_string()))?;
    store
        .retrieve(&blob_hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("blob {blob_hash}")))
}
