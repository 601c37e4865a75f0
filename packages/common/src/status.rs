#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an uploaded dataset.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    /// Blob stored, metadata persisted, never processed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "uploaded"))]
    Uploaded,
    /// A worker currently holds an active job for this dataset.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "processing"))]
    Processing,
    /// Processing finished and a report exists.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "done"))]
    Done,
    /// Processing terminated with an error.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
}

impl DatasetStatus {
    /// All possible status values.
    pub const ALL: &'static [DatasetStatus] =
        &[Self::Uploaded, Self::Processing, Self::Done, Self::Failed];

    /// Returns the string representation (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a processing job during its lifecycle.
///
/// Transitions are acyclic: Queued -> Started -> (Retrying <-> Started) -> Success | Failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted and published, waiting for a worker.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "queued"))]
    Queued,
    /// Claimed by a worker.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "started"))]
    Started,
    /// A transient failure occurred; the worker will re-attempt.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "retrying"))]
    Retrying,
    /// Terminal: processing completed and the report was persisted.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "success"))]
    Success,
    /// Terminal: processing failed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failure"))]
    Failure,
}

impl JobState {
    /// All possible state values.
    pub const ALL: &'static [JobState] = &[
        Self::Queued,
        Self::Started,
        Self::Retrying,
        Self::Success,
        Self::Failure,
    ];

    /// States in which a job occupies the per-dataset active slot.
    pub const ACTIVE: &'static [JobState] = &[Self::Queued, Self::Started, Self::Retrying];

    /// Returns true if the job still occupies the per-dataset active slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Started | Self::Retrying)
    }

    /// Returns true if the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Returns the string representation (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid state or status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError {
    invalid: String,
    valid: &'static str,
}

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid value '{}'. Valid values: {}", self.invalid, self.valid)
    }
}

impl std::error::Error for ParseStateError {}

impl FromStr for DatasetStatus {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseStateError {
                invalid: s.to_string(),
                valid: "uploaded, processing, done, failed",
            }),
        }
    }
}

impl FromStr for JobState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "started" => Ok(Self::Started),
            "retrying" => Ok(Self::Retrying),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            _ => Err(ParseStateError {
                invalid: s.to_string(),
                valid: "queued, started, retrying, success, failure",
            }),
        }
    }
}
