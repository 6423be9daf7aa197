use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "contest_model_photo_projection")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub contest_id: i64,
    pub model_version: String,
    pub model_photo_id: i64,
    pub x: f32,
    pub y: f32,
    /// Present only when the basis dim is at least 3.
    pub z: Option<f32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
