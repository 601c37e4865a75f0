use common::{DatasetStatus, JobState};
use db::entity::{dataset, job};
use serde::Serialize;
use uuid::Uuid;

/// Response for dataset uploads (both fresh and deduplicated).
#[derive(Serialize, utoipa::ToSchema)]
pub struct DatasetUploadResponse {
    pub id: Uuid,
    pub name: String,
    pub status: DatasetStatus,
    pub checksum_sha256: String,
    pub size_bytes: i64,
}

impl From<dataset::Model> for DatasetUploadResponse {
    fn from(model: dataset::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            status: model.status,
            checksum_sha256: model.checksum_sha256,
            size_bytes: model.size_bytes,
        }
    }
}

/// Read projection of a dataset with its latest job and report availability.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DatasetSummary {
    pub id: Uuid,
    pub name: String,
    pub status: DatasetStatus,
    pub row_count: Option<i32>,
    pub latest_job_id: Option<Uuid>,
    pub report_available: bool,
    pub error: Option<String>,
}

impl DatasetSummary {
    pub fn project(
        dataset: dataset::Model,
        latest_job_id: Option<Uuid>,
        report_available: bool,
    ) -> Self {
        Self {
            id: dataset.id,
            name: dataset.name,
            status: dataset.status,
            row_count: dataset.row_count,
            latest_job_id,
            report_available,
            error: dataset.error,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DatasetListResponse {
    pub datasets: Vec<DatasetSummary>,
}

/// Response for the enqueue endpoint.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub dataset_id: Uuid,
    pub state: JobState,
    pub progress: i32,
}

impl From<job::Model> for EnqueueResponse {
    fn from(model: job::Model) -> Self {
        Self {
            job_id: model.id,
            dataset_id: model.dataset_id,
            state: model.state,
            progress: model.progress,
        }
    }
}
