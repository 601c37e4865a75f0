//! Transactional store operations for datasets, jobs, and reports.
//!
//! Every state change is a conditional update predicated on the current
//! state set (CAS-on-state). There are no application-level locks: the
//! enqueue race is settled by the partial unique index on active jobs, and
//! worker-side transitions settle by `rows_affected`.

use chrono::Utc;
use common::{DatasetStatus, JobState};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{dataset, job, report};
use crate::error::{Result, StoreError};

/// Fields of a new dataset row. `status` is always `uploaded` and
/// `uploaded_at` is stamped at insert time.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub id: Uuid,
    pub name: String,
    pub original_filename: String,
    pub content_type: String,
    pub checksum_sha256: String,
    pub size_bytes: i64,
    pub upload_bucket: String,
    pub upload_key: String,
    pub upload_etag: Option<String>,
}

/// Outcome of attempting to create a queued job.
#[derive(Debug)]
pub enum CreateJobOutcome {
    /// A fresh queued job was inserted.
    Created(job::Model),
    /// The partial unique index rejected the insert; this is the active job
    /// that won the race.
    ActiveExists(job::Model),
}

/// Optional column updates applied together with a job state transition.
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    pub progress: Option<i32>,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub finished_at: Option<chrono::DateTime<Utc>>,
    pub error: Option<String>,
}

/// Optional column updates applied together with a dataset status transition.
#[derive(Debug, Default, Clone)]
pub struct DatasetPatch {
    pub processed_at: Option<chrono::DateTime<Utc>>,
    pub row_count: Option<i32>,
    pub error: Option<String>,
    /// Reset the error column, e.g. when a previously failed dataset is
    /// claimed for a fresh run.
    pub clear_error: bool,
}

/// Return a dataset by checksum, if it exists.
pub async fn find_dataset_by_checksum(
    db: &DatabaseConnection,
    checksum_sha256: &str,
) -> Result<Option<dataset::Model>> {
    Ok(dataset::Entity::find()
        .filter(dataset::Column::ChecksumSha256.eq(checksum_sha256))
        .one(db)
        .await?)
}

/// Atomic insert-or-fetch keyed by `checksum_sha256`.
///
/// Returns the persisted row and whether this call created it. Two uploads
/// racing on the same bytes both land here; the loser's insert is a no-op and
/// it reads back the winner's row.
pub async fn create_dataset_if_new(
    db: &DatabaseConnection,
    new: NewDataset,
) -> Result<(dataset::Model, bool)> {
    let checksum = new.checksum_sha256.clone();

    let model = dataset::ActiveModel {
        id: Set(new.id),
        name: Set(new.name),
        original_filename: Set(new.original_filename),
        content_type: Set(new.content_type),
        status: Set(DatasetStatus::Uploaded),
        checksum_sha256: Set(new.checksum_sha256),
        size_bytes: Set(new.size_bytes),
        uploaded_at: Set(Utc::now()),
        processed_at: Set(None),
        row_count: Set(None),
        error: Set(None),
        upload_bucket: Set(new.upload_bucket),
        upload_key: Set(new.upload_key),
        upload_etag: Set(new.upload_etag),
        ..Default::default()
    };

    let created = match dataset::Entity::insert(model)
        .on_conflict(
            OnConflict::column(dataset::Column::ChecksumSha256)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await
    {
        Ok(rows) => rows > 0,
        Err(DbErr::RecordNotInserted) => false,
        Err(e) => return Err(e.into()),
    };

    let row = find_dataset_by_checksum(db, &checksum)
        .await?
        .ok_or_else(|| {
            StoreError::Inconsistent(format!("dataset missing after insert (checksum {checksum})"))
        })?;

    Ok((row, created))
}

/// Return a dataset by id.
pub async fn get_dataset(
    db: &DatabaseConnection,
    dataset_id: Uuid,
) -> Result<Option<dataset::Model>> {
    Ok(dataset::Entity::find_by_id(dataset_id).one(db).await?)
}

/// Latest job for a dataset in an active state, if any.
pub async fn latest_active_job(
    db: &DatabaseConnection,
    dataset_id: Uuid,
) -> Result<Option<job::Model>> {
    Ok(job::Entity::find()
        .filter(job::Column::DatasetId.eq(dataset_id))
        .filter(job::Column::State.is_in(JobState::ACTIVE.iter().copied()))
        .order_by_desc(job::Column::QueuedAt)
        .order_by_desc(job::Column::Id)
        .one(db)
        .await?)
}

/// Latest job for a dataset regardless of state, if any.
pub async fn latest_job(db: &DatabaseConnection, dataset_id: Uuid) -> Result<Option<job::Model>> {
    Ok(job::Entity::find()
        .filter(job::Column::DatasetId.eq(dataset_id))
        .order_by_desc(job::Column::QueuedAt)
        .order_by_desc(job::Column::Id)
        .one(db)
        .await?)
}

/// Insert a job in `queued` state.
///
/// If the partial unique index on active jobs rejects the insert, the
/// concurrently created active job is fetched and returned instead.
pub async fn create_queued_job(
    db: &DatabaseConnection,
    dataset_id: Uuid,
) -> Result<CreateJobOutcome> {
    let model = job::ActiveModel {
        id: Set(Uuid::new_v4()),
        dataset_id: Set(dataset_id),
        task_id: Set(None),
        state: Set(JobState::Queued),
        progress: Set(0),
        queued_at: Set(Utc::now()),
        started_at: Set(None),
        finished_at: Set(None),
        error: Set(None),
        ..Default::default()
    };

    match model.insert(db).await {
        Ok(created) => Ok(CreateJobOutcome::Created(created)),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            let existing = latest_active_job(db, dataset_id).await?.ok_or_else(|| {
                StoreError::Inconsistent(format!(
                    "active-job conflict for dataset {dataset_id} but no active job found"
                ))
            })?;
            Ok(CreateJobOutcome::ActiveExists(existing))
        }
        Err(e) => Err(e.into()),
    }
}

/// Insert a terminal `success` job row without publishing anything.
///
/// Used to expose a job handle for datasets that reached `done` outside the
/// normal pipeline. `task_id` stays NULL: no broker message ever existed.
pub async fn create_synthetic_success_job(
    db: &DatabaseConnection,
    dataset_id: Uuid,
) -> Result<job::Model> {
    let now = Utc::now();
    let model = job::ActiveModel {
        id: Set(Uuid::new_v4()),
        dataset_id: Set(dataset_id),
        task_id: Set(None),
        state: Set(JobState::Success),
        progress: Set(100),
        queued_at: Set(now),
        started_at: Set(Some(now)),
        finished_at: Set(Some(now)),
        error: Set(None),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Compare-and-swap a job's state.
///
/// The update applies only if the job currently sits in one of `from`;
/// returns whether a row was updated. A `false` outcome is how duplicate
/// deliveries and stale transitions detect each other.
pub async fn transition_job<C: ConnectionTrait>(
    conn: &C,
    job_id: Uuid,
    from: &[JobState],
    to: JobState,
    patch: JobPatch,
) -> Result<bool> {
    let mut update = job::Entity::update_many()
        .col_expr(job::Column::State, Expr::value(to))
        .filter(job::Column::Id.eq(job_id))
        .filter(job::Column::State.is_in(from.iter().copied()));

    if let Some(progress) = patch.progress {
        update = update.col_expr(job::Column::Progress, Expr::value(progress));
    }
    if let Some(started_at) = patch.started_at {
        update = update.col_expr(job::Column::StartedAt, Expr::value(Some(started_at)));
    }
    if let Some(finished_at) = patch.finished_at {
        update = update.col_expr(job::Column::FinishedAt, Expr::value(Some(finished_at)));
    }
    if let Some(error) = patch.error {
        update = update.col_expr(job::Column::Error, Expr::value(Some(error)));
    }

    let result = update.exec(conn).await?;
    Ok(result.rows_affected > 0)
}

/// Bump a job's progress without changing state.
///
/// Guarded on the current state and on monotonicity, so a stale writer can
/// never move progress backwards.
pub async fn advance_job_progress<C: ConnectionTrait>(
    conn: &C,
    job_id: Uuid,
    state: JobState,
    progress: i32,
) -> Result<bool> {
    let result = job::Entity::update_many()
        .col_expr(job::Column::Progress, Expr::value(progress))
        .filter(job::Column::Id.eq(job_id))
        .filter(job::Column::State.eq(state))
        .filter(job::Column::Progress.lte(progress))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Persist the broker correlation token on a freshly published job.
pub async fn set_job_task_id(
    db: &DatabaseConnection,
    job_id: Uuid,
    task_id: &str,
) -> Result<()> {
    job::Entity::update_many()
        .col_expr(job::Column::TaskId, Expr::value(Some(task_id.to_string())))
        .filter(job::Column::Id.eq(job_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Compare-and-swap a dataset's status.
pub async fn transition_dataset<C: ConnectionTrait>(
    conn: &C,
    dataset_id: Uuid,
    from: &[DatasetStatus],
    to: DatasetStatus,
    patch: DatasetPatch,
) -> Result<bool> {
    let mut update = dataset::Entity::update_many()
        .col_expr(dataset::Column::Status, Expr::value(to))
        .filter(dataset::Column::Id.eq(dataset_id))
        .filter(dataset::Column::Status.is_in(from.iter().copied()));

    if let Some(processed_at) = patch.processed_at {
        update = update.col_expr(dataset::Column::ProcessedAt, Expr::value(Some(processed_at)));
    }
    if let Some(row_count) = patch.row_count {
        update = update.col_expr(dataset::Column::RowCount, Expr::value(Some(row_count)));
    }
    if let Some(error) = patch.error {
        update = update.col_expr(dataset::Column::Error, Expr::value(Some(error)));
    } else if patch.clear_error {
        update = update.col_expr(dataset::Column::Error, Expr::value(Option::<String>::None));
    }

    let result = update.exec(conn).await?;
    Ok(result.rows_affected > 0)
}

/// Upsert report metadata by `dataset_id`.
pub async fn upsert_report<C: ConnectionTrait>(
    conn: &C,
    dataset_id: Uuid,
    bucket: &str,
    key: &str,
    etag: Option<&str>,
) -> Result<()> {
    let model = report::ActiveModel {
        id: Set(Uuid::new_v4()),
        dataset_id: Set(dataset_id),
        created_at: Set(Utc::now()),
        report_bucket: Set(bucket.to_string()),
        report_key: Set(key.to_string()),
        report_etag: Set(etag.map(str::to_string)),
        ..Default::default()
    };

    match report::Entity::insert(model)
        .on_conflict(
            OnConflict::column(report::Column::DatasetId)
                .update_columns([
                    report::Column::ReportBucket,
                    report::Column::ReportKey,
                    report::Column::ReportEtag,
                    report::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
    {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Atomically finalize a successful run: upsert the report row, CAS the job
/// `started -> success` (progress 100), and CAS the dataset
/// `processing -> done` in a single transaction, so "report row exists <=>
/// dataset done <=> job success" holds at every commit point.
///
/// Returns `false` (rolling everything back) if either CAS loses, which only
/// happens when another delivery already finalized the job.
pub async fn finalize_success(
    db: &DatabaseConnection,
    job_id: Uuid,
    dataset_id: Uuid,
    report_bucket: &str,
    report_key: &str,
    report_etag: Option<&str>,
    row_count: i32,
) -> Result<bool> {
    let now = Utc::now();
    let txn = db.begin().await?;

    upsert_report(&txn, dataset_id, report_bucket, report_key, report_etag).await?;

    let job_ok = transition_job(
        &txn,
        job_id,
        &[JobState::Started],
        JobState::Success,
        JobPatch {
            progress: Some(100),
            finished_at: Some(now),
            ..Default::default()
        },
    )
    .await?;
    if !job_ok {
        txn.rollback().await?;
        return Ok(false);
    }

    let dataset_ok = transition_dataset(
        &txn,
        dataset_id,
        &[DatasetStatus::Processing],
        DatasetStatus::Done,
        DatasetPatch {
            processed_at: Some(now),
            row_count: Some(row_count),
            ..Default::default()
        },
    )
    .await?;
    if !dataset_ok {
        txn.rollback().await?;
        return Ok(false);
    }

    txn.commit().await?;
    Ok(true)
}

/// Whether report metadata exists for a dataset.
pub async fn report_exists(db: &DatabaseConnection, dataset_id: Uuid) -> Result<bool> {
    let count = report::Entity::find()
        .filter(report::Column::DatasetId.eq(dataset_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Return persisted report metadata for a dataset.
pub async fn get_report(
    db: &DatabaseConnection,
    dataset_id: Uuid,
) -> Result<Option<report::Model>> {
    Ok(report::Entity::find()
        .filter(report::Column::DatasetId.eq(dataset_id))
        .one(db)
        .await?)
}

/// Dataset plus its latest job id and report availability.
pub async fn dataset_summary(
    db: &DatabaseConnection,
    dataset_id: Uuid,
) -> Result<Option<(dataset::Model, Option<Uuid>, bool)>> {
    let Some(dataset) = get_dataset(db, dataset_id).await? else {
        return Ok(None);
    };

    let latest_job_id: Option<Uuid> = job::Entity::find()
        .select_only()
        .column(job::Column::Id)
        .filter(job::Column::DatasetId.eq(dataset_id))
        .order_by_desc(job::Column::QueuedAt)
        .order_by_desc(job::Column::Id)
        .into_tuple()
        .one(db)
        .await?;

    let report_available = report_exists(db, dataset_id).await?;

    Ok(Some((dataset, latest_job_id, report_available)))
}

/// All datasets (newest upload first) with latest job id and report
/// availability, resolved in three batched queries.
pub async fn list_dataset_summaries(
    db: &DatabaseConnection,
) -> Result<Vec<(dataset::Model, Option<Uuid>, bool)>> {
    let datasets = dataset::Entity::find()
        .order_by_desc(dataset::Column::UploadedAt)
        .order_by_desc(dataset::Column::Id)
        .all(db)
        .await?;
    if datasets.is_empty() {
        return Ok(vec![]);
    }

    let dataset_ids: Vec<Uuid> = datasets.iter().map(|d| d.id).collect();

    let jobs: Vec<(Uuid, Uuid)> = job::Entity::find()
        .select_only()
        .column(job::Column::DatasetId)
        .column(job::Column::Id)
        .filter(job::Column::DatasetId.is_in(dataset_ids.clone()))
        .order_by_asc(job::Column::DatasetId)
        .order_by_desc(job::Column::QueuedAt)
        .order_by_desc(job::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let mut latest_job_by_dataset = std::collections::HashMap::new();
    for (dataset_id, job_id) in jobs {
        latest_job_by_dataset.entry(dataset_id).or_insert(job_id);
    }

    let report_dataset_ids: std::collections::HashSet<Uuid> = report::Entity::find()
        .select_only()
        .column(report::Column::DatasetId)
        .filter(report::Column::DatasetId.is_in(dataset_ids))
        .into_tuple()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(datasets
        .into_iter()
        .map(|dataset| {
            let latest = latest_job_by_dataset.get(&dataset.id).copied();
            let has_report = report_dataset_ids.contains(&dataset.id);
            (dataset, latest, has_report)
        })
        .collect())
}

/// Return a single job by id.
pub async fn get_job(db: &DatabaseConnection, job_id: Uuid) -> Result<Option<job::Model>> {
    Ok(job::Entity::find_by_id(job_id).one(db).await?)
}

/// All jobs ordered by queue time descending.
pub async fn list_jobs(db: &DatabaseConnection) -> Result<Vec<job::Model>> {
    Ok(job::Entity::find()
        .order_by_desc(job::Column::QueuedAt)
        .order_by_desc(job::Column::Id)
        .all(db)
        .await?)
}
