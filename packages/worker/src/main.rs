mod config;
mod error;
mod handlers;
mod processing;

use std::sync::Arc;

use anyhow::Context;
use common::ProcessJob;
use common::storage::filesystem::FilesystemObjectStore;
use mq::{BroccoliError, BrokerMessage, MqConfig, init_mq};
use tracing::{error, info};

use crate::handlers::process::{Outcome, ProcessContext, process_delivery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = config::WorkerAppConfig::load().context("Failed to load config")?;
    info!("Worker starting: {}", config.worker.id);

    let db = db::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let object_store = Arc::new(
        FilesystemObjectStore::new(config.storage.root.clone())
            .await
            .context("Failed to initialize object store")?,
    );

    let mq = init_mq(MqConfig {
        url: config.mq.url.clone(),
        pool_size: config.mq.pool_size,
    })
    .await
    .context("Failed to initialize MQ")?;

    info!(
        queue_name = %config.mq.queue_name,
        concurrency = config.worker.concurrency,
        max_rows = config.processing.max_rows,
        "MQ connected"
    );

    let ctx = Arc::new(ProcessContext {
        db,
        object_store,
        reports_bucket: config.storage.reports_bucket.clone(),
        max_rows: config.processing.max_rows,
        retry: config.processing.retry,
    });

    let result = mq
        .process_messages(
            &config.mq.queue_name,
            Some(config.worker.concurrency),
            None,
            move |message: BrokerMessage<ProcessJob>| {
                let ctx = Arc::clone(&ctx);
                async move { handle_message(&ctx, message).await }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Worker stopped unexpectedly");
    }

    Ok(())
}

/// Process one delivery.
///
/// Terminal outcomes (including duplicate-delivery claims) return `Ok` so the
/// message is acknowledged. Only a failure to record any terminal transition
/// bubbles an error out, leaving the message for redelivery.
async fn handle_message(
    ctx: &ProcessContext,
    message: BrokerMessage<ProcessJob>,
) -> Result<(), BroccoliError> {
    let job = message.payload;
    info!(
        dataset_id = %job.dataset_id,
        job_id = %job.job_id,
        task_id = %message.task_id,
        "Received processing job"
    );

    match process_delivery(ctx, &job).await {
        Ok(Outcome::Completed { row_count }) => {
            info!(job_id = %job.job_id, row_count, "Job succeeded");
            Ok(())
        }
        Ok(Outcome::Failed) => {
            info!(job_id = %job.job_id, "Job failed terminally");
            Ok(())
        }
        Ok(Outcome::Duplicate) => {
            info!(job_id = %job.job_id, "Duplicate delivery acknowledged");
            Ok(())
        }
        Err(e) => {
            error!(job_id = %job.job_id, error = %e, "Could not record terminal state");
            Err(BroccoliError::Job(format!(
                "job {} left non-terminal: {e}",
                job.job_id
            )))
        }
    }
}
