use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pull_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub repository_id: Uuid,
    pub number: i64,
    pub base_branch: String,
    pub head_branch: String,
    pub title: String,
    pub description: Option<String>,
    pub author: String,
    /// One of `OPEN`/`CLOSED`/`MERGED`.
    pub status: String,
    pub merge_commit_hash: Option<String>,
    pub merged_at: Option<DateTimeUtc>,
    pub merged_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
