use axum::Json;
use axum::extract::{Path, State};
use db::store;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::models::job::{JobListResponse, JobResponse};
use crate::state::AppState;

/// List jobs.
#[utoipa::path(
    get,
    path = "/",
    tag = "Jobs",
    operation_id = "listJobs",
    summary = "List processing jobs",
    description = "Returns all jobs ordered by queue time descending.",
    responses(
        (status = 200, description = "Job list", body = JobListResponse),
        (status = 503, description = "Database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<JobListResponse>, AppError> {
    let jobs = store::list_jobs(&state.db).await?;

    Ok(Json(JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}

/// Get a single job.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Jobs",
    operation_id = "getJob",
    summary = "Get job details",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job details", body = JobResponse),
        (status = 404, description = "Job not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(job_id = %id))]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = store::get_job(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found.".into()))?;

    Ok(Json(JobResponse::from(job)))
}
