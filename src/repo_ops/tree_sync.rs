//! Rebuild a tree after a single-path write or delete (§4.2: "a commit's
//! tree is rebuilt bottom-up from the changed leaf to the root, rather than
//! mutated in place — trees are immutable once hashed").

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::errors::EngineError;
use crate::model::{EntryKind, Tree, TreeEntry};

const DEFAULT_FILE_MODE: &str = "100644";
const DEFAULT_DIR_MODE: &str = "040000";

/// Write `bytes` at `path` under `base_tree_hash`, creating intermediate
/// directories as needed, and return the new root tree hash. `base_tree_hash`
/// of `None` starts from an empty tree (the first commit).
pub async fn update_file(
    db: &DatabaseConnection,
    store: &dyn BlobStore,
    repository_id: Uuid,
    base_tree_hash: Option<&str>,
    path: &str,
    bytes: &[u8],
) -> Result<String, EngineError> {
    let segments = split_path(path)?;
    let blob = super::create_blob(db, store, repository_id, bytes).await?;
    rebuild_with_leaf(db, repository_id, base_tree_hash, &segments, Some((blob.hash, DEFAULT_FILE_MODE.to_string())), path).await
}

/// Remove `path` from `base_tree_hash` and return the new root tree hash.
/// Returns `EngineError::PathNotFound` if the path does not exist.
pub async fn delete_file(
    db: &DatabaseConnection,
    repository_id: Uuid,
    base_tree_hash: &str,
    path: &str,
) -> Result<String, EngineError> {
    let segments = split_path(path)?;
    if super::get_blob_hash_from_path(db, repository_id, base_tree_hash, path)
        .await?
        .is_none()
    {
        return Err(EngineError::PathNotFound(path.to_string()));
    }
    rebuild_with_leaf(db, repository_id, Some(base_tree_hash), &segments, None, path).await
}

fn split_path(path: &str) -> Result<Vec<String>, EngineError> {
    let segments: Vec<String> = path.split('/').filter(|s| !s.is_empty()).map(String::from).collect();
    if segments.is_empty() {
        return Err(EngineError::InvalidInput(format!("empty path: {path:?}")));
    }
    Ok(segments)
}

/// Recursively rebuild every tree on the path from the root down to the
/// changed leaf. `leaf` is `Some((blob_hash, mode))` for a write, `None` for
/// a delete. `full_path` is carried along only to name the offending path in
/// a `PathNotFound` error; it never drives the walk itself.
async fn rebuild_with_leaf(
    db: &DatabaseConnection,
    repository_id: Uuid,
    tree_hash: Option<&str>,
    segments: &[String],
    leaf: Option<(String, String)>,
    full_path: &str,
) -> Result<String, EngineError> {
    let mut entries = match tree_hash {
        Some(hash) => super::get_tree(db, repository_id, hash).await?.map(|t| t.entries).unwrap_or_default(),
        None => Vec::new(),
    };

    let name = &segments[0];
    entries.retain(|e| &e.name != name);

    if segments.len() == 1 {
        if let Some((blob_hash, mode)) = leaf {
            entries.push(TreeEntry {
                name: name.clone(),
                kind: EntryKind::Blob,
                target_hash: blob_hash,
                mode,
            });
        }
        // `leaf == None` at the final segment means the file entry was
        // already dropped above — deletion is complete at this level.
    } else {
        // `tree_hash` of `None` here only ever means "no base tree at all"
        // (the very first commit) — once a base tree exists, a directory
        // segment that isn't one of its entries is rejected rather than
        // silently synthesised (§4.2's "new directory segments ... are
        // rejected"); see `tree_hash_for_child`.
        let child_hash = tree_hash_for_child(db, repository_id, tree_hash, name, full_path).await?;
        let new_child_hash = Box::pin(rebuild_with_leaf(db, repository_id, child_hash.as_deref(), &segments[1..], leaf, full_path)).await?;
        entries.push(TreeEntry {
            name: name.clone(),
            kind: EntryKind::Tree,
            target_hash: new_child_hash,
            mode: DEFAULT_DIR_MODE.to_string(),
        });
    }

    let new_tree = Tree::new(repository_id, entries)?;
    super::create_tree(db, repository_id, new_tree.entries.clone()).await?;
    Ok(new_tree.hash)
}

/// Resolve `name`'s subtree hash within `parent_tree_hash`. `None` only
/// propagates when there is no parent tree at all (the first commit);
/// once a parent tree exists, a missing or wrong-kind entry is a hard
/// `PathNotFound` rather than an implicit new directory.
async fn tree_hash_for_child(
    db: &DatabaseConnection,
    repository_id: Uuid,
    parent_tree_hash: Option<&str>,
    name: &str,
    full_path: &str,
) -> Result<Option<String>, EngineError> {
    let Some(hash) = parent_tree_hash else { return Ok(None) };
    let tree = super::get_tree(db, repository_id, hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("tree {hash}")))?;
    match tree.entry(name) {
        Some(e) if e.kind == EntryKind::Tree => Ok(Some(e.target_hash.clone())),
        _ => Err(EngineError::PathNotFound(full_path.to_string())),
    }
}
