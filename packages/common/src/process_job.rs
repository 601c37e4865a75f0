use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A processing job message published to the worker queue.
///
/// The payload is intentionally minimal: the worker re-reads everything else
/// from the metadata store, so a stale message can never carry stale state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessJob {
    /// Dataset to process.
    pub dataset_id: Uuid,
    /// Job row this delivery belongs to.
    pub job_id: Uuid,
}

impl ProcessJob {
    pub fn new(dataset_id: Uuid, job_id: Uuid) -> Self {
        Self { dataset_id, job_id }
    }
}
