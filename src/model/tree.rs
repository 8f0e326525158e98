//! Blob / Tree / Commit — the immutable, content-addressed layer (§3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_json, sha256_hex};
use crate::errors::EngineError;

/// `(repo, hash)` → `size`, `storage_key`. Immutable, deduplicated by hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blob {
    pub repository_id: uuid::Uuid,
    pub hash: String,
    pub size: i64,
    pub storage_key: String,
}

/// What a [`TreeEntry`] points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Blob,
    Tree,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Blob => "BLOB",
            EntryKind::Tree => "TREE",
        }
    }
}

/// One named entry in a [`Tree`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub target_hash: String,
    /// POSIX-style file mode, e.g. `"100644"` for a regular file, `"040000"`
    /// for a subtree.
    pub mode: String,
}

/// Canonical form hashed to derive a `Tree`'s id: the entry fields only,
/// sorted by name, so renaming the Rust struct never changes the hash.
#[derive(Serialize)]
struct HashableEntry<'a> {
    name: &'a str,
    kind: &'a str,
    target_hash: &'a str,
    mode: &'a str,
}

/// `(repo, hash)` → ordered set of [`TreeEntry`]. Hash is SHA-256 over the
/// entries (sorted by name, unique by name) as canonical JSON (I1, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tree {
    pub repository_id: uuid::Uuid,
    pub hash: String,
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Sort `entries` by name, reject duplicate names, and compute the hash.
    /// Does not touch storage; callers upsert via `repo_ops`.
    pub fn new(repository_id: uuid::Uuid, mut entries: Vec<TreeEntry>) -> Result<Self, EngineError> {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for w in entries.windows(2) {
            if w[0].name == w[1].name {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate tree entry name: {}",
                    w[0].name
                )));
            }
        }
        let hash = Self::compute_hash(&entries)?;
        Ok(Self {
            repository_id,
            hash,
            entries,
        })
    }

    /// SHA-256 of the canonical JSON array of `{name, kind, target_hash,
    /// mode}`, sorted by name (§4.2). `entries` must already be sorted.
    pub fn compute_hash(entries: &[TreeEntry]) -> Result<String, EngineError> {
        let hashable: Vec<HashableEntry> = entries
            .iter()
            .map(|e| HashableEntry {
                name: &e.name,
                kind: e.kind.as_str(),
                target_hash: &e.target_hash,
                mode: &e.mode,
            })
            .collect();
        let json = canonical_json(&hashable)?;
        Ok(sha256_hex(json.as_bytes()))
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Canonical form hashed to derive a `Commit`'s id (§3: "SHA-256 over a
/// canonical JSON of {tree, parent, author, author_email, message,
/// timestamp}"). The open question in §9 ("commit hash includes timestamp")
/// is left unresolved behaviourally: `timestamp` participates in the hash
/// exactly as the source does, so two otherwise-identical commits created at
/// different instants get different hashes. Recorded in DESIGN.md.
#[derive(Serialize)]
struct HashableCommit<'a> {
    tree: &'a str,
    parent: Option<&'a str>,
    author: &'a str,
    author_email: &'a str,
    message: &'a str,
    timestamp: &'a str,
}

/// `(repo, hash)` → `{tree_hash, parent_hash?, author, author_email,
/// message, committed_at}`. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    pub repository_id: uuid::Uuid,
    pub hash: String,
    pub tree_hash: String,
    pub parent_hash: Option<String>,
    pub author: String,
    pub author_email: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        repository_id: uuid::Uuid,
        tree_hash: String,
        parent_hash: Option<String>,
        author: String,
        author_email: String,
        message: String,
        committed_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let timestamp = committed_at.to_rfc3339();
        let hashable = HashableCommit {
            tree: &tree_hash,
            parent: parent_hash.as_deref(),
            author: &author,
            author_email: &author_email,
            message: &message,
            timestamp: &timestamp,
        };
        let json = canonical_json(&hashable)?;
        let hash = sha256_hex(json.as_bytes());
        Ok(Self {
            repository_id,
            hash,
            tree_hash,
            parent_hash,
            author,
            author_email,
            message,
            committed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, target: &str) -> TreeEntry {
        TreeEntry {
            name: name.to_string(),
            kind: EntryKind::Blob,
            target_hash: target.to_string(),
            mode: "100644".to_string(),
        }
    }

    #[test]
    fn tree_hash_is_order_independent() {
        let repo = uuid::Uuid::nil();
        let a = Tree::new(repo, vec![entry("b.txt", "h2"), entry("a.txt", "h1")]).unwrap();
        let b = Tree::new(repo, vec![entry("a.txt", "h1"), entry("b.txt", "h2")]).unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.entries[0].name, "a.txt");
    }

    #[test]
    fn tree_rejects_duplicate_names() {
        let repo = uuid::Uuid::nil();
        let err = Tree::new(repo, vec![entry("a.txt", "h1"), entry("a.txt", "h2")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn commit_hash_is_deterministic_for_fixed_timestamp() {
        let repo = uuid::Uuid::nil();
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = Commit::new(
            repo,
            "tree1".into(),
            None,
            "a".into(),
            "a@example.com".into(),
            "msg".into(),
            ts,
        )
        .unwrap();
        let b = Commit::new(
            repo,
            "tree1".into(),
            None,
            "a".into(),
            "a@example.com".into(),
            "msg".into(),
            ts,
        )
        .unwrap();
        assert_eq!(a.hash, b.hash);
    }
}
