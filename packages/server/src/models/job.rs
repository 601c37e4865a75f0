use chrono::{DateTime, Utc};
use common::JobState;
use db::entity::job;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, utoipa::ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub state: JobState,
    pub progress: i32,
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<job::Model> for JobResponse {
    fn from(model: job::Model) -> Self {
        Self {
            id: model.id,
            dataset_id: model.dataset_id,
            state: model.state,
            progress: model.progress,
            error: model.error,
            queued_at: model.queued_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
}
