//! Job lifecycle controller: the idempotent enqueue path.
//!
//! Every caller of `POST /datasets/{id}/process` funnels through
//! [`enqueue`], which either hands back a job the client can poll or
//! surfaces a definite failure. At-most-one-active-job per dataset is
//! enforced by the partial unique index, not by anything here: the window
//! between the active-job check and the insert is closed by the database.

use chrono::Utc;
use common::{DatasetStatus, JobState, ProcessJob};
use db::entity::job;
use db::store::{self, CreateJobOutcome, JobPatch};
use mq::MqQueue;
use sea_orm::DatabaseConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

/// Resolve idempotent enqueue behavior for dataset processing.
#[instrument(skip(db, mq), fields(dataset_id = %dataset_id))]
pub async fn enqueue(
    db: &DatabaseConnection,
    mq: Option<&MqQueue>,
    queue_name: &str,
    dataset_id: Uuid,
) -> Result<job::Model, AppError> {
    let dataset = store::get_dataset(db, dataset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dataset not found.".into()))?;

    // Idempotency fast-path: an active job already represents this request.
    if let Some(active) = store::latest_active_job(db, dataset_id).await? {
        info!(job_id = %active.id, state = %active.state, "Returning active job");
        return Ok(active);
    }

    // Completed datasets are never reprocessed. Hand back a job handle: the
    // most recent real one, or a synthetic success row for datasets
    // materialized through administrative paths.
    if dataset.status == DatasetStatus::Done && store::report_exists(db, dataset_id).await? {
        if let Some(latest) = store::latest_job(db, dataset_id).await? {
            info!(job_id = %latest.id, "Dataset already done, returning latest job");
            return Ok(latest);
        }
        let synthetic = store::create_synthetic_success_job(db, dataset_id).await?;
        info!(job_id = %synthetic.id, "Dataset already done, created synthetic success job");
        return Ok(synthetic);
    }

    let job = match store::create_queued_job(db, dataset_id).await? {
        CreateJobOutcome::ActiveExists(existing) => {
            // Lost the race between the check above and the insert.
            info!(job_id = %existing.id, "Concurrent enqueue won, returning its job");
            return Ok(existing);
        }
        CreateJobOutcome::Created(job) => job,
    };

    publish(db, mq, queue_name, dataset_id, job).await
}

/// Publish the job message and persist the broker correlation token.
///
/// A failed publish must not leave an active job behind: the freshly queued
/// row is finalized as failed before the error surfaces.
async fn publish(
    db: &DatabaseConnection,
    mq: Option<&MqQueue>,
    queue_name: &str,
    dataset_id: Uuid,
    job: job::Model,
) -> Result<job::Model, AppError> {
    let message = ProcessJob::new(dataset_id, job.id);

    let Some(mq) = mq else {
        warn!(job_id = %job.id, "Message broker unavailable, failing job");
        fail_unpublished(db, job.id).await?;
        return Err(AppError::QueueUnavailable);
    };

    match mq.publish(queue_name, None, &message, None).await {
        Ok(delivery) => {
            let task_id = delivery.task_id.to_string();
            store::set_job_task_id(db, job.id, &task_id).await?;
            info!(job_id = %job.id, task_id = %task_id, "Processing job enqueued");
            Ok(job::Model {
                task_id: Some(task_id),
                ..job
            })
        }
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Failed to publish processing job");
            fail_unpublished(db, job.id).await?;
            Err(AppError::QueueUnavailable)
        }
    }
}

/// Finalize a never-published job so no active row is left behind.
async fn fail_unpublished(db: &DatabaseConnection, job_id: Uuid) -> Result<(), AppError> {
    store::transition_job(
        db,
        job_id,
        &[JobState::Queued],
        JobState::Failure,
        JobPatch {
            finished_at: Some(Utc::now()),
            error: Some("Failed to enqueue task.".into()),
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}
