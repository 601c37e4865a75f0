use utoipa_axum::{router::OpenApiRouter, routes};

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::health::healthcheck))
        .nest("/datasets", dataset_routes(config.storage.max_upload_size))
        .nest("/jobs", job_routes())
}

fn dataset_routes(max_upload_size: usize) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::dataset::list_datasets,
            handlers::dataset::upload_dataset,
        ))
        .routes(routes!(handlers::dataset::get_dataset))
        .routes(routes!(handlers::dataset::enqueue_processing))
        .routes(routes!(handlers::dataset::get_dataset_report))
        .layer(handlers::dataset::upload_body_limit(max_upload_size))
}

fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::job::list_jobs))
        .routes(routes!(handlers::job::get_job))
}
