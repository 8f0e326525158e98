use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stage_runs")]
pub struct Model {
    /// 64-char hex content hash, computed by
    /// [`crate::model::StageRun::compute_id`].
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub parent_id: Option<String>,
    pub repo_name: String,
    pub commit_hash: String,
    pub workflow_file: String,
    pub stage_name: String,
    /// Canonical JSON string of the arguments object.
    pub arguments: String,
    /// One of `pending`/`running`/`completed`/`failed`.
    pub status: String,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Json", nullable)]
    pub result_value: Option<Json>,
    pub error_message: Option<String>,
    pub triggered_by: Option<String>,
    pub trigger_event: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Whether a PENDING/RUNNING/FAILED state on this row blocks merge of
    /// its PR (§4.7's `.pr-checks.yml` `required` flag). Irrelevant to
    /// stage runs with no `trigger_event`.
    pub required: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
