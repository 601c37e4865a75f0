use common::JobState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub dataset_id: Uuid,

    /// Broker correlation token returned by publish. NULL until publication
    /// succeeds, and NULL forever for synthetic success jobs.
    pub task_id: Option<String>,

    pub state: JobState,
    /// 0..=100, monotonically non-decreasing within a job.
    pub progress: i32,

    pub queued_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub finished_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    #[sea_orm(belongs_to, from = "dataset_id", to = "id")]
    pub dataset: HasOne<super::dataset::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
