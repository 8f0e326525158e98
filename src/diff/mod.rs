//! The Diff Engine (§4.3, component D).
//!
//! Two entry points share one [`Event`] vocabulary: [`diff_trees`] walks the
//! base Git layer only (two tree hashes) and is what `repo_ops::history`
//! uses for `commit_affects_path` — cheap, and immune to the VFS's "crucial
//! twist" where an unchanged blob can carry different `StageRun` children
//! across commits. [`diff_commits`] walks the full VFS (§4.4), so it also
//! surfaces stage-run/stage-file subtrees that came or went with a commit.
//!
//! Both merge children by name in a single pass — present only in `before`
//! is `Removed`, present only in `after` is `Added`, present in both
//! recurses (containers) or compares content hashes (leaves). Traversal is
//! iterative (an explicit work stack) rather than recursive async fns, to
//! sidestep boxed-future boilerplate for what is, at bottom, a tree walk.

use std::collections::BTreeMap;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::model::EntryKind;
use crate::vfs::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Added {
        path: String,
        kind: &'static str,
        after_hash: Option<String>,
    },
    Removed {
        path: String,
        kind: &'static str,
        before_hash: Option<String>,
    },
    Modified {
        path: String,
        before_hash: String,
        after_hash: String,
    },
}

impl Event {
    pub fn path(&self) -> &str {
        match self {
            Event::Added { path, .. } => path,
            Event::Removed { path, .. } => path,
            Event::Modified { path, .. } => path,
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

async fn load_entries(
    db: &DatabaseConnection,
    repository_id: Uuid,
    tree_hash: Option<&str>,
) -> Result<BTreeMap<String, (EntryKind, String)>, EngineError> {
    let mut map = BTreeMap::new();
    let Some(hash) = tree_hash else { return Ok(map) };
    let tree = crate::repo_ops::get_tree(db, repository_id, hash)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("tree {hash}")))?;
    for entry in tree.entries {
        map.insert(entry.name, (entry.kind, entry.target_hash));
    }
    Ok(map)
}

/// Base-tree-only diff between two tree hashes. `before_tree_hash` of
/// `None` treats every entry as newly `Added` (the initial-commit case,
/// §8 boundary behaviour).
pub async fn diff_trees(
    db: &DatabaseConnection,
    repository_id: Uuid,
    before_tree_hash: Option<&str>,
    after_tree_hash: &str,
) -> Result<Vec<Event>, EngineError> {
    let mut events = Vec::new();
    // Work stack of (before tree hash, after tree hash, path prefix) pairs
    // still to diff as a directory-level comparison.
    let mut pending: Vec<(Option<String>, Option<String>, String)> =
        vec![(before_tree_hash.map(String::from), Some(after_tree_hash.to_string()), String::new())];

    while let Some((before_hash, after_hash, prefix)) = pending.pop() {
        let before = load_entries(db, repository_id, before_hash.as_deref()).await?;
        let after = load_entries(db, repository_id, after_hash.as_deref()).await?;

        let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
        names.sort();
        names.dedup();

        for name in names {
            let full_path = join_path(&prefix, name);
            match (before.get(name), after.get(name)) {
                (None, Some((kind, hash))) => emit_added_subtree(db, repository_id, *kind, hash, &full_path, &mut events).await?,
                (Some((kind, hash)), None) => emit_removed_subtree(db, repository_id, *kind, hash, &full_path, &mut events).await?,
                (Some((before_kind, before_hash)), Some((after_kind, after_hash))) => {
                    if before_kind != after_kind {
                        emit_removed_subtree(db, repository_id, *before_kind, before_hash, &full_path, &mut events).await?;
                        emit_added_subtree(db, repository_id, *after_kind, after_hash, &full_path, &mut events).await?;
                    } else {
                        match after_kind {
                            EntryKind::Tree => {
                                pending.push((Some(before_hash.clone()), Some(after_hash.clone()), full_path));
                            }
                            EntryKind::Blob => {
                                if before_hash != after_hash {
                                    events.push(Event::Modified {
                                        path: full_path,
                                        before_hash: before_hash.clone(),
                                        after_hash: after_hash.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
                (None, None) => unreachable!(),
            }
        }
    }
    Ok(events)
}

async fn emit_added_subtree(
    db: &DatabaseConnection,
    repository_id: Uuid,
    kind: EntryKind,
    hash: &str,
    path: &str,
    events: &mut Vec<Event>,
) -> Result<(), EngineError> {
    let mut pending = vec![(kind, hash.to_string(), path.to_string())];
    while let Some((kind, hash, path)) = pending.pop() {
        match kind {
            EntryKind::Blob => events.push(Event::Added {
                path,
                kind: "blob",
                after_hash: Some(hash),
            }),
            EntryKind::Tree => {
                events.push(Event::Added {
                    path: path.clone(),
                    kind: "tree",
                    after_hash: Some(hash.clone()),
                });
                let entries = load_entries(db, repository_id, Some(&hash)).await?;
                for (name, (child_kind, child_hash)) in entries {
                    pending.push((child_kind, child_hash, join_path(&path, &name)));
                }
            }
        }
    }
    Ok(())
}

async fn emit_removed_subtree(
    db: &DatabaseConnection,
    repository_id: Uuid,
    kind: EntryKind,
    hash: &str,
    path: &str,
    events: &mut Vec<Event>,
) -> Result<(), EngineError> {
    let mut pending = vec![(kind, hash.to_string(), path.to_string())];
    while let Some((kind, hash, path)) = pending.pop() {
        match kind {
            EntryKind::Blob => events.push(Event::Removed {
                path,
                kind: "blob",
                before_hash: Some(hash),
            }),
            EntryKind::Tree => {
                events.push(Event::Removed {
                    path: path.clone(),
                    kind: "tree",
                    before_hash: Some(hash.clone()),
                });
                let entries = load_entries(db, repository_id, Some(&hash)).await?;
                for (name, (child_kind, child_hash)) in entries {
                    pending.push((child_kind, child_hash, join_path(&path, &name)));
                }
            }
        }
    }
    Ok(())
}

/// Attach originating-commit context to a freshly-loaded child so its own
/// stage-run children (if it's a `Blob`) resolve on the next traversal step
/// (vfs §9's "crucial twist") — `Node::children` hands back bare children
/// with no commit of their own.
fn attach_origin(node: Node, commit_hash: Option<&str>, path: &str) -> Node {
    match commit_hash {
        Some(hash) => node.with_origin(hash, path),
        None => node,
    }
}

/// Full VFS diff between two commits (§4.3, §4.4). `before_tree_hash` of
/// `None` treats every reachable node as newly `Added` (the initial-commit
/// case). Every `Blob` child discovered along the way is stamped with its
/// owning commit hash via [`attach_origin`], so stage-run subtrees hanging
/// off an otherwise-unchanged blob are still walked.
pub async fn diff_commits(
    db: &DatabaseConnection,
    repository_id: Uuid,
    before_commit_hash: Option<&str>,
    before_tree_hash: Option<&str>,
    after_commit_hash: &str,
    after_tree_hash: &str,
) -> Result<Vec<Event>, EngineError> {
    let before = before_tree_hash.map(|h| Node::commit_root(repository_id, h));
    let after = Node::commit_root(repository_id, after_tree_hash);

    let mut events = Vec::new();
    let mut pending: Vec<(Option<Node>, Option<Node>, String)> = vec![(before, Some(after), String::new())];

    while let Some((before_node, after_node, path)) = pending.pop() {
        match (before_node, after_node) {
            (None, None) => {}
            (None, Some(node)) => emit_vfs_added(db, node, after_commit_hash, &path, &mut events).await?,
            (Some(node), None) => {
                if let Some(before_commit_hash) = before_commit_hash {
                    emit_vfs_removed(db, node, before_commit_hash, &path, &mut events).await?;
                }
            }
            (Some(before_node), Some(after_node)) => {
                if before_node.kind() != after_node.kind() {
                    if let Some(before_commit_hash) = before_commit_hash {
                        emit_vfs_removed(db, before_node, before_commit_hash, &path, &mut events).await?;
                    }
                    emit_vfs_added(db, after_node, after_commit_hash, &path, &mut events).await?;
                    continue;
                }
                // A `Blob` is both a leaf (it has content) and, per the VFS's
                // "crucial twist", potentially a container (stage-run
                // children keyed by commit). Compare content where the node
                // kind has any, and always walk children too, rather than
                // treating content and children as mutually exclusive.
                let before_content = before_node.content(db).await?;
                let after_content = after_node.content(db).await?;
                if let (Some(b), Some(a)) = (before_content, after_content) {
                    if b.hash != a.hash {
                        events.push(Event::Modified {
                            path: path.clone(),
                            before_hash: b.hash,
                            after_hash: a.hash,
                        });
                    }
                }

                let before_children: BTreeMap<String, Node> = before_node.children(db).await?.into_iter().collect();
                let after_children: BTreeMap<String, Node> = after_node.children(db).await?.into_iter().collect();

                let mut names: Vec<&String> = before_children.keys().chain(after_children.keys()).collect();
                names.sort();
                names.dedup();

                for name in names {
                    let child_path = join_path(&path, name);
                    let before_child = before_children
                        .get(name)
                        .cloned()
                        .map(|n| attach_origin(n, before_commit_hash, &child_path));
                    let after_child = after_children
                        .get(name)
                        .cloned()
                        .map(|n| attach_origin(n, Some(after_commit_hash), &child_path));
                    pending.push((before_child, after_child, child_path));
                }
            }
        }
    }
    Ok(events)
}

async fn emit_vfs_added(db: &DatabaseConnection, node: Node, commit_hash: &str, path: &str, events: &mut Vec<Event>) -> Result<(), EngineError> {
    let mut pending = vec![(node, path.to_string())];
    while let Some((node, path)) = pending.pop() {
        let content = node.content(db).await?;
        events.push(Event::Added {
            path: path.clone(),
            kind: node.type_label(),
            after_hash: content.map(|c| c.hash),
        });
        for (name, child) in node.children(db).await? {
            let child_path = join_path(&path, &name);
            pending.push((attach_origin(child, Some(commit_hash), &child_path), child_path));
        }
    }
    Ok(())
}

async fn emit_vfs_removed(db: &DatabaseConnection, node: Node, commit_hash: &str, path: &str, events: &mut Vec<Event>) -> Result<(), EngineError> {
    let mut pending = vec![(node, path.to_string())];
    while let Some((node, path)) = pending.pop() {
        let content = node.content(db).await?;
        events.push(Event::Removed {
            path: path.clone(),
            kind: node.type_label(),
            before_hash: content.map(|c| c.hash),
        });
        for (name, child) in node.children(db).await? {
            let child_path = join_path(&path, &name);
            pending.push((attach_origin(child, Some(commit_hash), &child_path), child_path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_path_reads_through_all_variants() {
        let added = Event::Added {
            path: "a".into(),
            kind: "blob",
            after_hash: None,
        };
        let removed = Event::Removed {
            path: "b".into(),
            kind: "blob",
            before_hash: None,
        };
        let modified = Event::Modified {
            path: "c".into(),
            before_hash: "x".into(),
            after_hash: "y".into(),
        };
        assert_eq!(added.path(), "a");
        assert_eq!(removed.path(), "b");
        assert_eq!(modified.path(), "c");
    }

    #[test]
    fn join_path_handles_root() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a", "b"), "a/b");
    }
}
