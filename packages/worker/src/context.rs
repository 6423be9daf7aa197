use std::sync::Arc;

use common::storage::BlobStore;
use sea_orm::DatabaseConnection;

use crate::embed::Embedder;

/// Shared handles built once at startup and threaded through every pipeline.
#[derive(Clone)]
pub struct AppContext {
    pub db: DatabaseConnection,
    pub store: Arc<dyn BlobStore>,
    pub embedder: Arc<dyn Embedder>,
}
