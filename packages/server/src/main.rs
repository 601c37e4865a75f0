use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderName, HeaderValue, Method};
use common::storage::filesystem::FilesystemObjectStore;
use mq::{MqConfig, init_mq};
use tower_http::cors::CorsLayer;
use tracing::{Level, info, warn};

use server::config::AppConfig;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = db::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let object_store = Arc::new(
        FilesystemObjectStore::new(config.storage.root.clone())
            .await
            .context("Failed to initialize object store")?,
    );

    let mq = if config.mq.enabled {
        match init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        {
            Ok(queue) => {
                info!(queue_name = %config.mq.queue_name, "MQ connected");
                Some(Arc::new(queue))
            }
            Err(e) => {
                // Enqueue requests will answer 503 until a restart.
                warn!(error = %e, "MQ unavailable at startup");
                None
            }
        }
    } else {
        warn!("MQ disabled by config");
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server host/port")?;

    let cors = build_cors_layer(&config);

    let state = AppState {
        db,
        config,
        mq,
        object_store,
    };

    let app = server::build_router(state).layer(cors);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors
        .allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(Duration::from_secs(config.server.cors.max_age))
}
