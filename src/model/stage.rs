//! The staging area (§3: "Stage (staging area) and StageFile (staging)").
//!
//! A mutable workspace that accumulates `(path → blob_hash)` pairs before
//! being materialised into a commit via `repo_ops::update_file`-style tree
//! synthesis. Distinct from the invocation output [`super::StageFile`] —
//! disambiguated in the glossary as "Stage (noun in two senses)".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub branch: String,
    pub base_commit_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Stage {
    pub fn new(repository_id: Uuid, branch: String, base_commit_hash: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            repository_id,
            branch,
            base_commit_hash,
            created_at: Utc::now(),
        }
    }
}

/// A pending `(path → blob_hash)` change inside a [`Stage`], not yet
/// committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagingFile {
    pub stage_id: Uuid,
    pub path: String,
    pub blob_hash: String,
    pub deleted: bool,
}
