use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use db::StoreError;
use serde::Serialize;

/// Structured error response body.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    /// Request-shape or content validation failure (422).
    Validation(String),
    /// Upload content type outside the accepted set (415).
    UnsupportedMediaType(String),
    /// Resource absent (404).
    NotFound(String),
    /// Object store unreachable or failing (503).
    StorageUnavailable(String),
    /// Metadata store unreachable or failing (503).
    DatabaseUnavailable(String),
    /// Broker publish failed (503).
    QueueUnavailable,
    /// Unclassified (500). The detail is logged, never returned.
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::UnsupportedMediaType(content_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorBody {
                    code: "UNSUPPORTED_MEDIA_TYPE",
                    message: format!("Unsupported content type: {content_type}"),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::StorageUnavailable(detail) => {
                tracing::error!("Object store error: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "OBJECT_STORE_UNAVAILABLE",
                        message: "Storage service error.".into(),
                    },
                )
            }
            AppError::DatabaseUnavailable(detail) => {
                tracing::error!("Database error: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "DATABASE_UNAVAILABLE",
                        message: "Database error.".into(),
                    },
                )
            }
            AppError::QueueUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    code: "QUEUE_UNAVAILABLE",
                    message: "Failed to enqueue task.".into(),
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred. Please try again later.".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DatabaseUnavailable(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) | StorageError::InvalidChecksum(msg) => {
                AppError::Internal(msg)
            }
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}
