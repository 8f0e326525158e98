use sea_orm::entity::prelude::*;

/// Output files produced by a [`super::stage_run`] (§3's `StageFile`, distinct
/// from [`super::staging_file`]'s staging-area rows).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stage_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub stage_run_id: String,
    pub file_path: String,
    pub content_hash: String,
    pub storage_key: String,
    pub size: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
