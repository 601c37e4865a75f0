use axum::Json;

use crate::models::MessageResponse;

/// Lightweight healthcheck.
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    operation_id = "healthcheck",
    summary = "Service healthcheck",
    responses((status = 200, description = "Service is up", body = MessageResponse)),
)]
pub async fn healthcheck() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "ok".into(),
    })
}
