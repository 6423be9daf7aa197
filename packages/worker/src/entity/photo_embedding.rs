use common::PhotoType;
use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "photo_embeddings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub contest_id: i64,
    pub photo_id: i64,
    pub photo_type: PhotoType,
    pub storage_key: String,
    pub model_version: String,
    /// Only value this worker ever writes: "READY".
    pub status: String,
    #[sea_orm(column_type = "Vector(Some(512))")]
    pub embedding: PgVector,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
