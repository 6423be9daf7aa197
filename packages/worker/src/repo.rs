use chrono::Utc;
use common::{EmbeddingJob, PhotoType};
use sea_orm::entity::prelude::PgVector;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entity::{model_photo, photo_embedding, photo_projection, projection_basis, user_photo};

/// Status stamped on every embedding row this worker writes.
pub const STATUS_READY: &str = "READY";

/// Method tag stored with every projection basis.
pub const METHOD_PCA: &str = "PCA";

/// One projected point, row-aligned with the embeddings the basis was fit on.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPoint {
    pub model_photo_id: i64,
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

/// Whether the photo a job refers to still exists, by photo type.
pub async fn photo_exists<C: ConnectionTrait>(
    conn: &C,
    photo_type: PhotoType,
    photo_id: i64,
) -> Result<bool, DbErr> {
    let found = match photo_type {
        PhotoType::User => user_photo::Entity::find_by_id(photo_id)
            .one(conn)
            .await?
            .is_some(),
        PhotoType::Model => model_photo::Entity::find_by_id(photo_id)
            .one(conn)
            .await?
            .is_some(),
    };
    Ok(found)
}

/// Insert or overwrite the embedding row for a job. Keyed by
/// `(contest_id, photo_id, photo_type, model_version)`; last writer wins.
pub async fn upsert_embedding<C: ConnectionTrait>(
    conn: &C,
    job: &EmbeddingJob,
    embedding: Vec<f32>,
) -> Result<(), DbErr> {
    let now = Utc::now();
    let model = photo_embedding::ActiveModel {
        contest_id: Set(job.contest_id),
        photo_id: Set(job.photo_id),
        photo_type: Set(job.photo_type),
        storage_key: Set(job.storage_key.clone()),
        model_version: Set(job.model_version.clone()),
        status: Set(STATUS_READY.to_string()),
        embedding: Set(PgVector::from(embedding)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    photo_embedding::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                photo_embedding::Column::ContestId,
                photo_embedding::Column::PhotoId,
                photo_embedding::Column::PhotoType,
                photo_embedding::Column::ModelVersion,
            ])
            .update_columns([
                photo_embedding::Column::Status,
                photo_embedding::Column::StorageKey,
                photo_embedding::Column::Embedding,
                photo_embedding::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

/// All READY MODEL-type embeddings for a contest/model-version group, as
/// `(photo_id, embedding)` pairs ordered by photo id.
pub async fn fetch_ready_model_embeddings<C: ConnectionTrait>(
    conn: &C,
    contest_id: i64,
    model_version: &str,
) -> Result<Vec<(i64, Vec<f32>)>, DbErr> {
    let rows = photo_embedding::Entity::find()
        .filter(photo_embedding::Column::ContestId.eq(contest_id))
        .filter(photo_embedding::Column::ModelVersion.eq(model_version))
        .filter(photo_embedding::Column::PhotoType.eq(PhotoType::Model))
        .filter(photo_embedding::Column::Status.eq(STATUS_READY))
        .order_by_asc(photo_embedding::Column::PhotoId)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.photo_id, row.embedding.to_vec()))
        .collect())
}

/// Insert or overwrite the basis for `(contest_id, model_version, PCA, dim)`
/// and return the row id. `components` must already be flattened row-major.
pub async fn upsert_basis<C: ConnectionTrait>(
    conn: &C,
    contest_id: i64,
    model_version: &str,
    dim: usize,
    mean: Vec<f32>,
    components: Vec<f32>,
) -> Result<i64, DbErr> {
    let now = Utc::now();
    let model = projection_basis::ActiveModel {
        contest_id: Set(contest_id),
        model_version: Set(model_version.to_string()),
        method: Set(METHOD_PCA.to_string()),
        dim: Set(dim as i32),
        mean: Set(mean),
        components: Set(components),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    projection_basis::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                projection_basis::Column::ContestId,
                projection_basis::Column::ModelVersion,
                projection_basis::Column::Method,
                projection_basis::Column::Dim,
            ])
            .update_columns([
                projection_basis::Column::Mean,
                projection_basis::Column::Components,
                projection_basis::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    let saved = projection_basis::Entity::find()
        .filter(projection_basis::Column::ContestId.eq(contest_id))
        .filter(projection_basis::Column::ModelVersion.eq(model_version))
        .filter(projection_basis::Column::Method.eq(METHOD_PCA))
        .filter(projection_basis::Column::Dim.eq(dim as i32))
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::Custom("contest_projection_basis row missing after upsert".into()))?;

    Ok(saved.id)
}

/// Insert or overwrite one projection row per point, in one statement.
/// Keyed by `(contest_id, model_version, model_photo_id)`.
pub async fn upsert_projections<C: ConnectionTrait>(
    conn: &C,
    contest_id: i64,
    model_version: &str,
    points: &[ProjectedPoint],
) -> Result<(), DbErr> {
    if points.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let models = points.iter().map(|point| photo_projection::ActiveModel {
        contest_id: Set(contest_id),
        model_version: Set(model_version.to_string()),
        model_photo_id: Set(point.model_photo_id),
        x: Set(point.x),
        y: Set(point.y),
        z: Set(point.z),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    });

    photo_projection::Entity::insert_many(models)
        .on_conflict(
            OnConflict::columns([
                photo_projection::Column::ContestId,
                photo_projection::Column::ModelVersion,
                photo_projection::Column::ModelPhotoId,
            ])
            .update_columns([
                photo_projection::Column::X,
                photo_projection::Column::Y,
                photo_projection::Column::Z,
                photo_projection::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}
