use std::sync::Arc;

use common::storage::ObjectStore;
use mq::MqQueue;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    /// `None` when the broker is disabled or unreachable at startup; enqueue
    /// requests then surface 503.
    pub mq: Option<Arc<MqQueue>>,
    pub object_store: Arc<dyn ObjectStore>,
}
