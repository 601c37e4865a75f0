use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::storage::{Checksum, keys};
use db::store;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::lifecycle;
use crate::models::dataset::{
    DatasetListResponse, DatasetSummary, DatasetUploadResponse, EnqueueResponse,
};
use crate::state::AppState;
use crate::utils::filename::normalize_upload_filename;

/// Content types the parser understands.
const ALLOWED_CONTENT_TYPES: &[&str] = &["text/csv", "application/json"];

/// Body limit for dataset uploads.
pub fn upload_body_limit(max_size: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_size + 4096)
}

/// One received multipart upload, before validation.
struct UploadParts {
    name: Option<String>,
    file: Option<(Option<String>, Option<String>, Vec<u8>)>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadParts, AppError> {
    let mut parts = UploadParts {
        name: None,
        file: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read name: {e}")))?;
                parts.name = Some(text);
            }
            Some("file") => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?;
                parts.file = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {} // Ignore unknown fields.
        }
    }

    Ok(parts)
}

/// Upload a dataset.
#[utoipa::path(
    post,
    path = "/",
    tag = "Datasets",
    operation_id = "uploadDataset",
    summary = "Upload a tabular dataset",
    description = "Uploads a CSV or JSON-array dataset. The `name` and `file` multipart fields \
        are required. Uploads are deduplicated by content checksum: re-uploading identical bytes \
        returns the original dataset regardless of name or filename.",
    request_body(content_type = "multipart/form-data", description = "Dataset upload"),
    responses(
        (status = 201, description = "Dataset stored (or deduplicated)", body = DatasetUploadResponse),
        (status = 415, description = "Unsupported content type (UNSUPPORTED_MEDIA_TYPE)", body = ErrorBody),
        (status = 422, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Storage or database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_dataset(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let parts = read_multipart(multipart).await?;

    let name = parts
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("name must not be blank".into()))?
        .to_string();

    let (filename, content_type, bytes) = parts
        .file
        .ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    let content_type = content_type.unwrap_or_default();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::UnsupportedMediaType(content_type));
    }

    let filename =
        filename.ok_or_else(|| AppError::Validation("filename is required.".into()))?;
    let original_filename = normalize_upload_filename(&filename)
        .map_err(|e| AppError::Validation(e.message().into()))?;

    if bytes.len() > state.config.storage.max_upload_size {
        return Err(AppError::Validation(format!(
            "File exceeds maximum size of {} bytes",
            state.config.storage.max_upload_size
        )));
    }

    let checksum_sha256 = Checksum::compute(&bytes).to_hex();
    let size_bytes = bytes.len() as i64;

    info!(
        dataset_name = %name,
        content_type = %content_type,
        size_bytes,
        "Dataset upload received"
    );

    // Idempotency: identical bytes already exist, skip the object store
    // entirely and return the original row.
    if let Some(existing) = store::find_dataset_by_checksum(&state.db, &checksum_sha256).await? {
        info!(dataset_id = %existing.id, "Upload deduplicated by checksum");
        return Ok((
            StatusCode::CREATED,
            Json(DatasetUploadResponse::from(existing)),
        ));
    }

    let dataset_id = Uuid::new_v4();
    let upload_bucket = state.config.storage.uploads_bucket.clone();
    let upload_key = keys::upload_key(dataset_id, &original_filename);

    state.object_store.ensure_bucket(&upload_bucket).await?;
    let upload_etag = state
        .object_store
        .put(&upload_bucket, &upload_key, &bytes, &content_type)
        .await?;

    let (dataset, created) = store::create_dataset_if_new(
        &state.db,
        store::NewDataset {
            id: dataset_id,
            name,
            original_filename,
            content_type,
            checksum_sha256,
            size_bytes,
            upload_bucket,
            upload_key,
            upload_etag: Some(upload_etag),
        },
    )
    .await?;

    info!(
        dataset_id = %dataset.id,
        created,
        size_bytes,
        "Dataset upload completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(DatasetUploadResponse::from(dataset)),
    ))
}

/// List datasets.
#[utoipa::path(
    get,
    path = "/",
    tag = "Datasets",
    operation_id = "listDatasets",
    summary = "List datasets",
    description = "Returns all datasets, newest upload first, with latest job id and report availability.",
    responses(
        (status = 200, description = "Dataset list", body = DatasetListResponse),
        (status = 503, description = "Database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_datasets(
    State(state): State<AppState>,
) -> Result<Json<DatasetListResponse>, AppError> {
    let summaries = store::list_dataset_summaries(&state.db).await?;

    Ok(Json(DatasetListResponse {
        datasets: summaries
            .into_iter()
            .map(|(dataset, latest_job_id, report_available)| {
                DatasetSummary::project(dataset, latest_job_id, report_available)
            })
            .collect(),
    }))
}

/// Get a single dataset.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Datasets",
    operation_id = "getDataset",
    summary = "Get dataset details",
    params(("id" = Uuid, Path, description = "Dataset ID")),
    responses(
        (status = 200, description = "Dataset summary", body = DatasetSummary),
        (status = 404, description = "Dataset not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(dataset_id = %id))]
pub async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DatasetSummary>, AppError> {
    let (dataset, latest_job_id, report_available) = store::dataset_summary(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dataset not found.".into()))?;

    Ok(Json(DatasetSummary::project(
        dataset,
        latest_job_id,
        report_available,
    )))
}

/// Enqueue background processing for a dataset.
#[utoipa::path(
    post,
    path = "/{id}/process",
    tag = "Datasets",
    operation_id = "processDataset",
    summary = "Enqueue dataset processing",
    description = "Idempotent: while a job is active, repeated calls return that job; once the \
        dataset is done, the completed job is returned and nothing is re-published.",
    params(("id" = Uuid, Path, description = "Dataset ID")),
    responses(
        (status = 202, description = "Job queued or already resolved", body = EnqueueResponse),
        (status = 404, description = "Dataset not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Broker or database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(dataset_id = %id))]
pub async fn enqueue_processing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mq = state.mq.as_deref();
    let job = lifecycle::enqueue(&state.db, mq, &state.config.mq.queue_name, id).await?;

    info!(job_id = %job.id, state = %job.state, progress = job.progress, "Enqueue resolved");

    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse::from(job))))
}

/// Fetch the generated report for a dataset.
#[utoipa::path(
    get,
    path = "/{id}/report",
    tag = "Datasets",
    operation_id = "getDatasetReport",
    summary = "Get the profile report",
    description = "Returns the persisted report JSON exactly as generated by the worker.",
    params(("id" = Uuid, Path, description = "Dataset ID")),
    responses(
        (status = 200, description = "Report JSON", content_type = "application/json"),
        (status = 404, description = "Report not ready (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Storage or database unavailable", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(dataset_id = %id))]
pub async fn get_dataset_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let report = store::get_report(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found.".into()))?;

    let payload = state
        .object_store
        .get(&report.report_bucket, &report.report_key)
        .await
        .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

    info!(
        report_key = %report.report_key,
        payload_size = payload.len(),
        "Report downloaded"
    );

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
        .into_response())
}
