use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "contest_projection_basis")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub contest_id: i64,
    pub model_version: String,
    pub method: String,
    pub dim: i32,
    /// Per-dimension mean of the fitted embeddings (length d).
    pub mean: Vec<f32>,
    /// d×dim basis flattened row-major: components[i * dim + j] = W[i][j].
    /// Downstream readers reconstruct the matrix with that layout.
    pub components: Vec<f32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
