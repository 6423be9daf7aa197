use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job payload: {0}")]
    Validation(#[from] common::ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] common::storage::StorageError),

    #[error("Embedding error: {0}")]
    Embed(#[from] crate::embed::EmbedError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("PCA error: {0}")]
    Pca(#[from] crate::pca::math::PcaError),

    #[error("MQ error: {0}")]
    Mq(String),
}

impl From<mq::MqError> for WorkerError {
    fn from(e: mq::MqError) -> Self {
        WorkerError::Mq(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

/// How a successfully handled job ended. Both variants acknowledge the
/// message; `Skipped` means the subject photo row no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Upserted,
    Skipped,
}
