//! Repository and Ref (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `{id, name unique, description?, main_branch default "main"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub main_branch: String,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(name: String, description: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            description,
            main_branch: "main".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn default_branch_ref(&self) -> String {
        format!("refs/heads/{}", self.main_branch)
    }
}

/// `(repo, name)` → `commit_hash`. Mutable pointer. Names are full
/// (`refs/heads/<x>`, `refs/tags/<x>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ref {
    pub repository_id: Uuid,
    pub name: String,
    pub commit_hash: String,
}

impl Ref {
    pub fn branch_name(branch: &str) -> String {
        format!("refs/heads/{branch}")
    }

    pub fn tag_name(tag: &str) -> String {
        format!("refs/tags/{tag}")
    }
}
