use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::entity::{photo_embedding, photo_projection, projection_basis};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("worker::entity::*")
        .sync(&db)
        .await?;

    ensure_unique_indexes(&db).await?;

    Ok(db)
}

/// Ensure the composite unique indexes the upserts target exist.
///
/// SeaORM's schema-sync doesn't cover composite unique indexes, so they are
/// created manually on startup. Every ON CONFLICT clause in `repo` depends on
/// one of these, so failure here is fatal.
async fn ensure_unique_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let statements = [
        Index::create()
            .if_not_exists()
            .name("uq_photo_embeddings_identity")
            .table(photo_embedding::Entity)
            .col(photo_embedding::Column::ContestId)
            .col(photo_embedding::Column::PhotoId)
            .col(photo_embedding::Column::PhotoType)
            .col(photo_embedding::Column::ModelVersion)
            .unique()
            .to_string(PostgresQueryBuilder),
        Index::create()
            .if_not_exists()
            .name("uq_contest_projection_basis_identity")
            .table(projection_basis::Entity)
            .col(projection_basis::Column::ContestId)
            .col(projection_basis::Column::ModelVersion)
            .col(projection_basis::Column::Method)
            .col(projection_basis::Column::Dim)
            .unique()
            .to_string(PostgresQueryBuilder),
        Index::create()
            .if_not_exists()
            .name("uq_contest_model_photo_projection_identity")
            .table(photo_projection::Entity)
            .col(photo_projection::Column::ContestId)
            .col(photo_projection::Column::ModelVersion)
            .col(photo_projection::Column::ModelPhotoId)
            .unique()
            .to_string(PostgresQueryBuilder),
    ];

    for stmt in statements {
        db.execute_unprepared(&stmt).await?;
    }

    info!("Ensured unique indexes for upsert targets");
    Ok(())
}
