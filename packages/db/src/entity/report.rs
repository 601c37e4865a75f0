use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metadata pointing at a generated report object. The report body itself
/// lives in the object store; a row here implies the object exists.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub dataset_id: Uuid,

    pub created_at: DateTimeUtc,

    pub report_bucket: String,
    pub report_key: String,
    pub report_etag: Option<String>,

    #[sea_orm(belongs_to, from = "dataset_id", to = "id")]
    pub dataset: HasOne<super::dataset::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
