use uuid::Uuid;

use crate::common::{TestApp, routes};

const CSV: &[u8] = b"id\n1\n2\n";

#[tokio::test]
async fn list_jobs_empty() {
    let app = TestApp::spawn().await;

    let res = app.get(routes::JOBS).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["jobs"], serde_json::json!([]));
}

#[tokio::test]
async fn get_job_not_found() {
    let app = TestApp::spawn().await;

    let res = app.get(&routes::job(Uuid::new_v4())).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.code(), "NOT_FOUND");
}

#[tokio::test]
async fn jobs_surface_enqueue_failures() {
    let app = TestApp::spawn().await;
    let dataset_id = app.upload_dataset("sales", "sales.csv", "text/csv", CSV).await;

    // Broker is disabled in tests: the enqueue fails and finalizes its job.
    let res = app.post(&routes::dataset_process(dataset_id)).await;
    assert_eq!(res.status, 503);

    let list = app.get(routes::JOBS).await;
    let jobs = list.body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["state"], "failure");
    assert_eq!(jobs[0]["error"], "Failed to enqueue task.");
    assert_eq!(
        jobs[0]["dataset_id"].as_str().unwrap(),
        dataset_id.to_string()
    );

    let job_id: Uuid = jobs[0]["id"].as_str().unwrap().parse().unwrap();
    let single = app.get(&routes::job(job_id)).await;
    assert_eq!(single.status, 200);
    assert_eq!(single.body["state"], "failure");
    assert!(single.body["queued_at"].as_str().is_some());
    assert!(single.body["finished_at"].as_str().is_some());
}

#[tokio::test]
async fn jobs_list_orders_newest_first() {
    let app = TestApp::spawn().await;

    let d1 = app.upload_dataset("one", "one.csv", "text/csv", b"a\n1\n").await;
    let d2 = app.upload_dataset("two", "two.csv", "text/csv", b"b\n2\n").await;

    // Each enqueue fails (no broker) and frees the active slot, so every
    // call creates a fresh job row.
    app.post(&routes::dataset_process(d1)).await;
    app.post(&routes::dataset_process(d2)).await;
    app.post(&routes::dataset_process(d1)).await;

    let res = app.get(routes::JOBS).await;
    let jobs = res.body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0]["dataset_id"].as_str().unwrap(), d1.to_string());
    assert_eq!(jobs[1]["dataset_id"].as_str().unwrap(), d2.to_string());
    assert_eq!(jobs[2]["dataset_id"].as_str().unwrap(), d1.to_string());
}
