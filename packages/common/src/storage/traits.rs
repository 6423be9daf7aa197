use async_trait::async_trait;

use super::error::StorageError;

/// Read-only access to stored image objects.
///
/// Implementations fetch from S3 (production) or the local filesystem (dev).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Retrieve all bytes for an object by its storage key.
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}
