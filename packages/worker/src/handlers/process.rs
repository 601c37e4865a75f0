//! Worker-side processing pipeline: drives one job from queued to terminal.
//!
//! Claim, download, parse, profile, finalize. Each step advances the job's
//! progress through a CAS-guarded update, so readers observe progress in
//! non-decreasing order. Duplicate deliveries lose the claim CAS and ack out
//! without touching anything.

use std::sync::Arc;

use chrono::Utc;
use common::retry::RetryPolicy;
use common::storage::{ObjectStore, keys};
use common::{DatasetStatus, JobState, ProcessJob};
use db::entity::dataset;
use db::store::{self, DatasetPatch, JobPatch};
use sea_orm::DatabaseConnection;
use tracing::{info, instrument, warn};

use crate::error::{ErrorClass, ProcessError};
use crate::processing::anomalies::compute_anomalies;
use crate::processing::parser;
use crate::processing::report::ProfileReport;
use crate::processing::stats::compute_stats;

/// Progress milestones written as the pipeline steps forward.
const PROGRESS_CLAIMED: i32 = 5;
const PROGRESS_PARSED: i32 = 25;
const PROGRESS_STATS: i32 = 60;
const PROGRESS_ANOMALIES: i32 = 85;

/// Everything one delivery needs.
pub struct ProcessContext {
    pub db: DatabaseConnection,
    pub object_store: Arc<dyn ObjectStore>,
    pub reports_bucket: String,
    pub max_rows: usize,
    pub retry: RetryPolicy,
}

/// Terminal result of handling one delivery.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Report persisted, job success, dataset done.
    Completed { row_count: i32 },
    /// Job finalized as failure (dataset mirrored).
    Failed,
    /// Claim or finalize lost: another delivery owns this job, or it is
    /// already terminal. Nothing was modified.
    Duplicate,
}

/// Handle one `ProcessJob` delivery to completion.
///
/// Transient infrastructure failures are retried in-process with backoff
/// (`started -> retrying -> started`); everything else finalizes the job
/// immediately. An `Err` return means even the terminal transition could not
/// be recorded, and the delivery should be redelivered by the broker.
#[instrument(skip(ctx), fields(dataset_id = %message.dataset_id, job_id = %message.job_id))]
pub async fn process_delivery(
    ctx: &ProcessContext,
    message: &ProcessJob,
) -> Result<Outcome, ProcessError> {
    if !claim(ctx, message).await? {
        info!("Claim lost, treating as duplicate delivery");
        return Ok(Outcome::Duplicate);
    }

    let mut attempt: u8 = 0;
    loop {
        match run_attempt(ctx, message).await {
            Ok(Some(row_count)) => {
                info!(row_count, "Processing completed");
                return Ok(Outcome::Completed { row_count });
            }
            Ok(None) => {
                info!("Finalize lost, treating as duplicate delivery");
                return Ok(Outcome::Duplicate);
            }
            Err(e) if e.class() == ErrorClass::Transient => {
                attempt += 1;

                // Record the transient failure before deciding anything.
                let moved = store::transition_job(
                    &ctx.db,
                    message.job_id,
                    &[JobState::Started],
                    JobState::Retrying,
                    JobPatch::default(),
                )
                .await?;
                if !moved {
                    warn!("Job no longer started while handling transient error");
                    return Ok(Outcome::Duplicate);
                }

                if attempt > ctx.retry.max_retries {
                    warn!(attempt, error = %e, "Retries exhausted");
                    return finalize_failure(ctx, message, JobState::Retrying, &e).await;
                }

                let delay = ctx.retry.backoff(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Transient failure, backing off");
                tokio::time::sleep(delay).await;

                // Reclaim. `started_at` is already set and progress stays
                // where the earlier attempt left it.
                let reclaimed = store::transition_job(
                    &ctx.db,
                    message.job_id,
                    &[JobState::Retrying],
                    JobState::Started,
                    JobPatch::default(),
                )
                .await?;
                if !reclaimed {
                    warn!("Reclaim lost after backoff");
                    return Ok(Outcome::Duplicate);
                }
            }
            Err(e) => {
                warn!(class = ?e.class(), error = %e, "Non-retryable failure");
                return finalize_failure(ctx, message, JobState::Started, &e).await;
            }
        }
    }
}

/// Step 1: claim the job and mark the dataset as processing.
///
/// Returns false when the CAS loses, which is exactly the duplicate-delivery
/// case: another worker holds the job, or it is already terminal.
async fn claim(ctx: &ProcessContext, message: &ProcessJob) -> Result<bool, ProcessError> {
    let Some(job) = store::get_job(&ctx.db, message.job_id).await? else {
        warn!("Job row missing for delivery");
        return Ok(false);
    };

    let claimed = store::transition_job(
        &ctx.db,
        message.job_id,
        &[JobState::Queued, JobState::Retrying],
        JobState::Started,
        JobPatch {
            // Progress only moves forward: a reclaim after a crash must not
            // rewind a later milestone.
            progress: (job.progress < PROGRESS_CLAIMED).then_some(PROGRESS_CLAIMED),
            started_at: Some(job.started_at.unwrap_or_else(Utc::now)),
            ..Default::default()
        },
    )
    .await?;
    if !claimed {
        return Ok(false);
    }

    store::transition_dataset(
        &ctx.db,
        message.dataset_id,
        &[
            DatasetStatus::Uploaded,
            DatasetStatus::Processing,
            DatasetStatus::Failed,
        ],
        DatasetStatus::Processing,
        DatasetPatch {
            // A fresh run supersedes any earlier failure.
            clear_error: true,
            ..Default::default()
        },
    )
    .await?;

    Ok(true)
}

/// Steps 2-7: download, parse, profile, upload, finalize.
///
/// Returns `Ok(Some(row_count))` on success, `Ok(None)` if the finalize CAS
/// lost to another delivery.
async fn run_attempt(
    ctx: &ProcessContext,
    message: &ProcessJob,
) -> Result<Option<i32>, ProcessError> {
    let dataset = fetch_dataset(ctx, message).await?;

    let payload = ctx
        .object_store
        .get(&dataset.upload_bucket, &dataset.upload_key)
        .await?;

    let rows = parser::parse_rows(&dataset.content_type, &payload, ctx.max_rows)?;
    advance(ctx, message, PROGRESS_PARSED).await?;

    let stats = compute_stats(&rows);
    advance(ctx, message, PROGRESS_STATS).await?;

    let anomalies = compute_anomalies(&rows, &stats);
    advance(ctx, message, PROGRESS_ANOMALIES).await?;

    let report = ProfileReport::assemble(dataset.id, stats, anomalies);
    let row_count = report.row_count as i32;
    let body = report
        .to_json_bytes()
        .map_err(|e| ProcessError::Unexpected(format!("Report serialization failed: {e}")))?;

    let report_key = keys::report_key(dataset.id);
    ctx.object_store.ensure_bucket(&ctx.reports_bucket).await?;
    let etag = ctx
        .object_store
        .put(&ctx.reports_bucket, &report_key, &body, "application/json")
        .await?;

    let finalized = store::finalize_success(
        &ctx.db,
        message.job_id,
        message.dataset_id,
        &ctx.reports_bucket,
        &report_key,
        Some(&etag),
        row_count,
    )
    .await?;

    Ok(finalized.then_some(row_count))
}

async fn fetch_dataset(
    ctx: &ProcessContext,
    message: &ProcessJob,
) -> Result<dataset::Model, ProcessError> {
    store::get_dataset(&ctx.db, message.dataset_id)
        .await?
        .ok_or_else(|| {
            ProcessError::Unexpected(format!("Dataset {} missing", message.dataset_id))
        })
}

/// Write a progress milestone. Monotonicity and the state guard live in the
/// store; a lost update here only means someone else finalized the job, and
/// the finalize CAS will settle that.
async fn advance(ctx: &ProcessContext, message: &ProcessJob, progress: i32) -> Result<(), ProcessError> {
    let advanced =
        store::advance_job_progress(&ctx.db, message.job_id, JobState::Started, progress).await?;
    if !advanced {
        warn!(progress, "Progress update lost");
    }
    Ok(())
}

/// Terminal failure: CAS the job to failure and mirror the error onto the
/// dataset row.
async fn finalize_failure(
    ctx: &ProcessContext,
    message: &ProcessJob,
    from: JobState,
    error: &ProcessError,
) -> Result<Outcome, ProcessError> {
    let error_message = error.to_string();

    let failed = store::transition_job(
        &ctx.db,
        message.job_id,
        &[from],
        JobState::Failure,
        JobPatch {
            finished_at: Some(Utc::now()),
            error: Some(error_message.clone()),
            ..Default::default()
        },
    )
    .await?;
    if !failed {
        warn!("Failure transition lost");
        return Ok(Outcome::Duplicate);
    }

    store::transition_dataset(
        &ctx.db,
        message.dataset_id,
        &[DatasetStatus::Processing],
        DatasetStatus::Failed,
        DatasetPatch {
            error: Some(error_message),
            ..Default::default()
        },
    )
    .await?;

    Ok(Outcome::Failed)
}
