use sea_orm::DbErr;
use thiserror::Error;

/// Metadata store errors.
///
/// Driver-level failures normalize to `Unavailable`; it is retryable by
/// worker policy and surfaces as 503 from the API. Absence is reported with
/// `Option` returns and CAS conflicts with `bool` outcomes, so neither shows
/// up here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Unavailable(#[from] DbErr),

    #[error("Store inconsistency: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
