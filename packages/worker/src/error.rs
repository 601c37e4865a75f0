use common::storage::StorageError;
use db::StoreError;
use thiserror::Error;

use crate::processing::parser::ParseError;

/// How the pipeline reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Infrastructure hiccup: retry with backoff.
    Transient,
    /// The uploaded bytes are unusable: fail immediately, never retry.
    InvalidPayload,
    /// Unclassified: fail immediately to avoid retry storms.
    Fatal,
}

/// Errors raised while processing one job.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Invalid dataset payload: {0}")]
    InvalidPayload(#[from] ParseError),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ProcessError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidPayload(_) => ErrorClass::InvalidPayload,
            Self::ObjectStore(_) | Self::Database(_) => ErrorClass::Transient,
            Self::Unexpected(_) => ErrorClass::Fatal,
        }
    }
}

impl From<StoreError> for ProcessError {
    fn from(e: StoreError) -> Self {
        ProcessError::Database(e.to_string())
    }
}

impl From<StorageError> for ProcessError {
    fn from(e: StorageError) -> Self {
        if e.is_transient() {
            ProcessError::ObjectStore(e.to_string())
        } else {
            // A missing or malformed object for a dataset the metadata store
            // vouches for is an inconsistency, not an outage.
            ProcessError::Unexpected(e.to_string())
        }
    }
}
