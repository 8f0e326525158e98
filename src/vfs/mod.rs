//! The Virtual File System (§4.4, §9, component E).
//!
//! A lazy, polymorphic tree expressed as a tagged variant rather than a
//! class hierarchy (§9): [`Node`] carries only the IDs needed to resolve
//! the node lazily through a borrowed `&DatabaseConnection` handle,
//! dispatch is by variant, and [`Node::children`]/[`Node::content`] are the
//! only two operations every variant supports.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::db::entities::{stage_file, stage_run};
use crate::errors::EngineError;
use crate::model::EntryKind;

/// The four node kinds named in §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Tree,
    Blob,
    StageRun,
    StageFile,
}

/// A value shaped like a [`crate::model::Blob`] without being a row in the
/// blob table — the "pseudo-blob" design note (§9): a [`StageFileNode`]'s
/// `content()` fabricates one of these rather than inheriting from `Blob`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub hash: String,
    pub size: i64,
    pub storage_key: String,
}

/// A lazy VFS node. Variants carry only identifiers; `children`/`content`
/// resolve lazily through a borrowed `&DatabaseConnection`.
#[derive(Debug, Clone)]
pub enum Node {
    Tree {
        repository_id: Uuid,
        hash: String,
    },
    /// Carries the originating commit and full path (§9: "keep the
    /// originating commit + full path on the node; do not rely on walking
    /// back through ancestors") so its stage-run children can be resolved.
    Blob {
        repository_id: Uuid,
        hash: String,
        commit_hash: String,
        path: String,
    },
    StageRun {
        repository_id: Uuid,
        id: String,
    },
    StageFile {
        repository_id: Uuid,
        id: String,
    },
}

impl Node {
    /// Root of a commit: `TreeNode(commit.tree_hash)` (§4.4).
    pub fn commit_root(repository_id: Uuid, tree_hash: &str) -> Self {
        Node::Tree {
            repository_id,
            hash: tree_hash.to_string(),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Node::Tree { .. } => Kind::Tree,
            Node::Blob { .. } => Kind::Blob,
            Node::StageRun { .. } => Kind::StageRun,
            Node::StageFile { .. } => Kind::StageFile,
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Node::Tree { .. } => "base tree",
            Node::Blob { .. } => "base blob",
            Node::StageRun { .. } => "StageRun",
            Node::StageFile { .. } => "StageFile",
        }
    }

    pub fn repository_id(&self) -> Uuid {
        match self {
            Node::Tree { repository_id, .. }
            | Node::Blob { repository_id, .. }
            | Node::StageRun { repository_id, .. }
            | Node::StageFile { repository_id, .. } => *repository_id,
        }
    }

    /// Lazy, sorted-by-name children (§4.4).
    pub async fn children(&self, db: &DatabaseConnection) -> Result<Vec<(String, Node)>, EngineError> {
        match self {
            Node::Tree { repository_id, hash } => {
                let tree = crate::repo_ops::get_tree(db, *repository_id, hash)
                    .await?
                    .ok_or_else(|| EngineError::not_found(format!("tree {hash}")))?;
                Ok(tree
                    .entries
                    .into_iter()
                    .map(|e| {
                        let node = match e.kind {
                            EntryKind::Tree => Node::Tree {
                                repository_id: *repository_id,
                                hash: e.target_hash,
                            },
                            EntryKind::Blob => Node::Blob {
                                repository_id: *repository_id,
                                hash: e.target_hash,
                                // A tree's own blob entries have no single
                                // owning commit at this level; callers that
                                // need stage-run children rebuild a `Blob`
                                // node with `with_origin` at the commit-walk
                                // call site, which does know the path.
                                commit_hash: String::new(),
                                path: e.name.clone(),
                            },
                        };
                        (e.name, node)
                    })
                    .collect())
            }
            Node::Blob {
                repository_id,
                commit_hash,
                path,
                ..
            } => {
                if commit_hash.is_empty() {
                    return Ok(Vec::new());
                }
                let repo_name = crate::repo_ops::get_repository_name(db, *repository_id).await?;
                // Only root stage runs: parent_id IS NULL (§4.4's "crucial twist").
                let mut runs = stage_run::Entity::find()
                    .filter(stage_run::Column::RepoName.eq(repo_name))
                    .filter(stage_run::Column::CommitHash.eq(commit_hash.clone()))
                    .filter(stage_run::Column::WorkflowFile.eq(path.clone()))
                    .filter(stage_run::Column::ParentId.is_null())
                    .order_by_asc(stage_run::Column::StageName)
                    .all(db)
                    .await?;
                runs.sort_by(|a, b| a.stage_name.cmp(&b.stage_name));
                Ok(runs
                    .into_iter()
                    .map(|r| {
                        (
                            r.stage_name.clone(),
                            Node::StageRun {
                                repository_id: *repository_id,
                                id: r.id,
                            },
                        )
                    })
                    .collect())
            }
            Node::StageRun { repository_id, id } => {
                let mut children: Vec<(String, Node)> = Vec::new();

                let files = stage_file::Entity::find()
                    .filter(stage_file::Column::StageRunId.eq(id.clone()))
                    .all(db)
                    .await?;
                for f in files {
                    children.push((
                        f.file_path.clone(),
                        Node::StageFile {
                            repository_id: *repository_id,
                            id: f.id,
                        },
                    ));
                }

                let mut child_runs = stage_run::Entity::find()
                    .filter(stage_run::Column::ParentId.eq(id.clone()))
                    .all(db)
                    .await?;
                child_runs.sort_by(|a, b| a.stage_name.cmp(&b.stage_name));
                for r in child_runs {
                    children.push((
                        r.stage_name.clone(),
                        Node::StageRun {
                            repository_id: *repository_id,
                            id: r.id,
                        },
                    ));
                }

                children.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(children)
            }
            Node::StageFile { .. } => Ok(Vec::new()),
        }
    }

    /// Leaf content, or `None` for pure containers (§4.4).
    pub async fn content(&self, db: &DatabaseConnection) -> Result<Option<Content>, EngineError> {
        match self {
            Node::Tree { .. } | Node::StageRun { .. } => Ok(None),
            Node::Blob { repository_id, hash, .. } => {
                let blob = crate::repo_ops::get_blob(db, *repository_id, hash).await?;
                Ok(blob.map(|b| Content {
                    hash: b.hash,
                    size: b.size,
                    storage_key: b.storage_key,
                }))
            }
            Node::StageFile { id, .. } => {
                let file = stage_file::Entity::find_by_id(id.clone()).one(db).await?;
                Ok(file.map(|f| Content {
                    hash: f.content_hash,
                    size: f.size,
                    storage_key: f.storage_key,
                }))
            }
        }
    }

    /// Attach originating-commit context to a bare `Blob` node produced by
    /// walking a `Tree`'s entries, so its stage-run children can resolve
    /// (§9). `path` is the node's full path from the commit root.
    pub fn with_origin(self, commit_hash: &str, path: &str) -> Self {
        match self {
            Node::Blob { repository_id, hash, .. } => Node::Blob {
                repository_id,
                hash,
                commit_hash: commit_hash.to_string(),
                path: path.to_string(),
            },
            other => other,
        }
    }
}

/// Resolve `<workflow_file>/<stage_name>/<child_stage_name>/…/[<output_file_name>]`
/// from a commit root (§4.4's "path language for stage views").
pub async fn resolve_stage_path(
    db: &DatabaseConnection,
    repository_id: Uuid,
    commit_hash: &str,
    tree_hash: &str,
    segments: &[&str],
) -> Result<Option<Node>, EngineError> {
    if segments.is_empty() {
        return Ok(Some(Node::commit_root(repository_id, tree_hash)));
    }
    let workflow_file = segments[0];
    let mut node = match Node::commit_root(repository_id, tree_hash)
        .children(db)
        .await?
        .into_iter()
        .find(|(name, _)| name == workflow_file)
    {
        Some((_, node)) => node.with_origin(commit_hash, workflow_file),
        None => return Ok(None),
    };
    for segment in &segments[1..] {
        let children = node.children(db).await?;
        node = match children.into_iter().find(|(name, _)| name == *segment) {
            Some((_, child)) => child,
            None => return Ok(None),
        };
    }
    Ok(Some(node))
}
