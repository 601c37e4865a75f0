use ::common::storage::{Checksum, keys};
use ::common::{DatasetStatus, JobState};
use db::store::{self, CreateJobOutcome, JobPatch};
use uuid::Uuid;

use crate::common::{TestApp, routes};

const HAPPY_CSV: &[u8] = b"id,region,total\n1,n,10\n2,s,20\n3,s,30\n";

/// Drive a seeded dataset to `done` the way the worker would: claim, report
/// object, atomic finalize.
async fn complete_processing(app: &TestApp, dataset_id: Uuid) -> Uuid {
    let job = match store::create_queued_job(&app.db, dataset_id).await.unwrap() {
        CreateJobOutcome::Created(j) => j,
        CreateJobOutcome::ActiveExists(j) => j,
    };

    store::transition_job(
        &app.db,
        job.id,
        &[JobState::Queued],
        JobState::Started,
        JobPatch {
            progress: Some(5),
            started_at: Some(chrono::Utc::now()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    store::transition_dataset(
        &app.db,
        dataset_id,
        &[DatasetStatus::Uploaded],
        DatasetStatus::Processing,
        Default::default(),
    )
    .await
    .unwrap();

    let report_key = keys::report_key(dataset_id);
    app.object_store.ensure_bucket("reports").await.unwrap();
    let body = serde_json::json!({
        "dataset_id": dataset_id,
        "generated_at": "2026-08-02T00:00:00Z",
        "row_count": 3,
        "null_counts": {"id": 0, "region": 0, "total": 0},
        "numeric": {},
        "anomalies": {"duplicates_count": 0, "outliers": {}},
    });
    let etag = app
        .object_store
        .put(
            "reports",
            &report_key,
            &serde_json::to_vec(&body).unwrap(),
            "application/json",
        )
        .await
        .unwrap();

    let finalized = store::finalize_success(
        &app.db,
        job.id,
        dataset_id,
        "reports",
        &report_key,
        Some(&etag),
        3,
    )
    .await
    .unwrap();
    assert!(finalized);

    job.id
}

#[tokio::test]
async fn healthcheck_echoes_request_id() {
    let app = TestApp::spawn().await;

    let res = app
        .get_with_request_id(routes::HEALTH, "corr-12345")
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["message"], "ok");
    assert_eq!(res.request_id.as_deref(), Some("corr-12345"));

    // A request id is generated when the client sends none.
    let res = app.get(routes::HEALTH).await;
    assert!(res.request_id.is_some());
}

#[tokio::test]
async fn upload_returns_created_dataset() {
    let app = TestApp::spawn().await;

    let res = app
        .upload(Some("sales"), Some("sales.csv"), "text/csv", HAPPY_CSV.to_vec())
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["name"], "sales");
    assert_eq!(res.body["status"], "uploaded");
    assert_eq!(res.body["size_bytes"], HAPPY_CSV.len() as i64);
    assert_eq!(
        res.body["checksum_sha256"],
        Checksum::compute(HAPPY_CSV).to_hex()
    );
}

#[tokio::test]
async fn upload_is_idempotent_by_content() {
    let app = TestApp::spawn().await;

    let first = app
        .upload(Some("sales"), Some("sales.csv"), "text/csv", HAPPY_CSV.to_vec())
        .await;
    assert_eq!(first.status, 201);

    // Same bytes, different name and filename.
    let second = app
        .upload(Some("other name"), Some("copy.csv"), "text/csv", HAPPY_CSV.to_vec())
        .await;
    assert_eq!(second.status, 201);
    assert_eq!(second.id(), first.id());
    assert_eq!(second.body["name"], "sales");

    let list = app.get(routes::DATASETS).await;
    assert_eq!(list.body["datasets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_validation_failures() {
    let app = TestApp::spawn().await;

    // Missing name field.
    let res = app
        .upload(None, Some("a.csv"), "text/csv", b"a\n1\n".to_vec())
        .await;
    assert_eq!(res.status, 422);
    assert_eq!(res.code(), "VALIDATION_ERROR");

    // Blank name.
    let res = app
        .upload(Some("   "), Some("a.csv"), "text/csv", b"a\n1\n".to_vec())
        .await;
    assert_eq!(res.status, 422);

    // Missing filename.
    let res = app.upload(Some("x"), None, "text/csv", b"a\n1\n".to_vec()).await;
    assert_eq!(res.status, 422);
    assert!(res.body["message"].as_str().unwrap().contains("filename"));

    // Unsupported content type.
    let res = app
        .upload(Some("x"), Some("a.txt"), "text/plain", b"a\n1\n".to_vec())
        .await;
    assert_eq!(res.status, 415);
    assert_eq!(res.code(), "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn upload_normalizes_filename_to_basename() {
    let app = TestApp::spawn().await;

    let id = app
        .upload_dataset("sales", "exports/2026/sales.csv", "text/csv", HAPPY_CSV)
        .await;

    let row = store::get_dataset(&app.db, id).await.unwrap().unwrap();
    assert_eq!(row.original_filename, "sales.csv");
    assert_eq!(row.upload_key, keys::upload_key(id, "sales.csv"));
}

#[tokio::test]
async fn get_dataset_projection() {
    let app = TestApp::spawn().await;

    let missing = app.get(&routes::dataset(Uuid::new_v4())).await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.code(), "NOT_FOUND");

    let id = app.upload_dataset("sales", "sales.csv", "text/csv", HAPPY_CSV).await;

    let res = app.get(&routes::dataset(id)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "uploaded");
    assert_eq!(res.body["report_available"], false);
    assert!(res.body["latest_job_id"].is_null());
    assert!(res.body["row_count"].is_null());
    assert!(res.body["error"].is_null());
}

#[tokio::test]
async fn enqueue_without_broker_fails_job_and_returns_503() {
    let app = TestApp::spawn().await;
    let id = app.upload_dataset("sales", "sales.csv", "text/csv", HAPPY_CSV).await;

    let res = app.post(&routes::dataset_process(id)).await;
    assert_eq!(res.status, 503);
    assert_eq!(res.code(), "QUEUE_UNAVAILABLE");
    assert_eq!(res.body["message"], "Failed to enqueue task.");

    // The short-lived job was finalized, not left active.
    let active = store::latest_active_job(&app.db, id).await.unwrap();
    assert!(active.is_none());

    let failed = store::latest_job(&app.db, id).await.unwrap().unwrap();
    assert_eq!(failed.state, JobState::Failure);
    assert_eq!(failed.error.as_deref(), Some("Failed to enqueue task."));
    assert!(failed.finished_at.is_some());

    // Visible through the read API as the dataset's latest job.
    let summary = app.get(&routes::dataset(id)).await;
    assert_eq!(
        summary.body["latest_job_id"].as_str().unwrap(),
        failed.id.to_string()
    );
}

#[tokio::test]
async fn enqueue_missing_dataset_is_404() {
    let app = TestApp::spawn().await;
    let res = app.post(&routes::dataset_process(Uuid::new_v4())).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn enqueue_returns_active_job_while_one_exists() {
    let app = TestApp::spawn().await;
    let id = app.upload_dataset("sales", "sales.csv", "text/csv", HAPPY_CSV).await;

    // A queued job exists (as if published and not yet picked up).
    let queued = match store::create_queued_job(&app.db, id).await.unwrap() {
        CreateJobOutcome::Created(j) => j,
        CreateJobOutcome::ActiveExists(j) => j,
    };

    // Even with the broker down, the fast-path returns the active job
    // without attempting a publish.
    let res = app.post(&routes::dataset_process(id)).await;
    assert_eq!(res.status, 202, "{}", res.text);
    assert_eq!(res.body["job_id"].as_str().unwrap(), queued.id.to_string());
    assert_eq!(res.body["state"], "queued");
    assert_eq!(res.body["progress"], 0);
}

#[tokio::test]
async fn reenqueue_after_completion_returns_original_job() {
    let app = TestApp::spawn().await;
    let id = app.upload_dataset("sales", "sales.csv", "text/csv", HAPPY_CSV).await;
    let job_id = complete_processing(&app, id).await;

    let job_count_before = store::list_jobs(&app.db).await.unwrap().len();

    let res = app.post(&routes::dataset_process(id)).await;
    assert_eq!(res.status, 202, "{}", res.text);
    assert_eq!(res.body["job_id"].as_str().unwrap(), job_id.to_string());
    assert_eq!(res.body["state"], "success");
    assert_eq!(res.body["progress"], 100);

    // No new job, no publish attempt.
    let job_count_after = store::list_jobs(&app.db).await.unwrap().len();
    assert_eq!(job_count_after, job_count_before);
}

#[tokio::test]
async fn done_dataset_without_jobs_gets_synthetic_success_job() {
    let app = TestApp::spawn().await;
    let id = app.upload_dataset("sales", "sales.csv", "text/csv", HAPPY_CSV).await;

    // Dataset materialized as done outside the pipeline: report row and
    // status exist, but no job was ever recorded.
    app.object_store.ensure_bucket("reports").await.unwrap();
    let report_key = keys::report_key(id);
    app.object_store
        .put("reports", &report_key, b"{}", "application/json")
        .await
        .unwrap();
    store::upsert_report(&app.db, id, "reports", &report_key, None)
        .await
        .unwrap();
    store::transition_dataset(
        &app.db,
        id,
        &[DatasetStatus::Uploaded],
        DatasetStatus::Done,
        db::store::DatasetPatch {
            processed_at: Some(chrono::Utc::now()),
            row_count: Some(3),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let res = app.post(&routes::dataset_process(id)).await;
    assert_eq!(res.status, 202, "{}", res.text);
    assert_eq!(res.body["state"], "success");
    assert_eq!(res.body["progress"], 100);

    let job_id: Uuid = res.body["job_id"].as_str().unwrap().parse().unwrap();
    let job = store::get_job(&app.db, job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Success);
    assert!(job.task_id.is_none());
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn report_endpoint_serves_persisted_bytes() {
    let app = TestApp::spawn().await;
    let id = app.upload_dataset("sales", "sales.csv", "text/csv", HAPPY_CSV).await;

    // Not ready yet.
    let res = app.get(&routes::dataset_report(id)).await;
    assert_eq!(res.status, 404);

    complete_processing(&app, id).await;

    let res = app.get(&routes::dataset_report(id)).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["row_count"], 3);
    assert_eq!(res.body["dataset_id"].as_str().unwrap(), id.to_string());

    // report_available flips with the report row.
    let summary = app.get(&routes::dataset(id)).await;
    assert_eq!(summary.body["status"], "done");
    assert_eq!(summary.body["report_available"], true);
    assert_eq!(summary.body["row_count"], 3);
}

#[tokio::test]
async fn list_datasets_orders_newest_first() {
    let app = TestApp::spawn().await;

    let first = app.upload_dataset("first", "a.csv", "text/csv", b"a\n1\n").await;
    let second = app.upload_dataset("second", "b.csv", "text/csv", b"b\n2\n").await;

    let res = app.get(routes::DATASETS).await;
    assert_eq!(res.status, 200);
    let datasets = res.body["datasets"].as_array().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0]["id"].as_str().unwrap(), second.to_string());
    assert_eq!(datasets[1]["id"].as_str().unwrap(), first.to_string());
}
