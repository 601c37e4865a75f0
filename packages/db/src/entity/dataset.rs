use common::DatasetStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "datasets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    pub original_filename: String,
    pub content_type: String,

    pub status: DatasetStatus,

    /// SHA-256 hex digest of the uploaded bytes. Sole dedup key for uploads.
    #[sea_orm(unique)]
    pub checksum_sha256: String,
    pub size_bytes: i64,

    pub uploaded_at: DateTimeUtc,
    /// Set by the worker when the dataset reaches `done`.
    pub processed_at: Option<DateTimeUtc>,
    pub row_count: Option<i32>,
    /// Mirrors the failing job's error when status is `failed`.
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    /// Object-store locator of the raw upload.
    pub upload_bucket: String,
    pub upload_key: String,
    pub upload_etag: Option<String>,

    #[sea_orm(has_many)]
    pub jobs: HasMany<super::job::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
