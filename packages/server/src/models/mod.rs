pub mod dataset;
pub mod job;

use serde::Serialize;

/// Minimal message body (healthcheck).
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
