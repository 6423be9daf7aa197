use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use super::error::StorageError;
use super::traits::BlobStore;

/// S3-backed object store.
///
/// The bucket is fixed at construction; job payloads that still carry a
/// bucket field are ignored here. Credentials come from the default AWS
/// chain (env, profile, instance role).
pub struct S3BlobStore {
    bucket: Box<Bucket>,
}

impl S3BlobStore {
    /// Connect to a bucket.
    ///
    /// A custom `endpoint` switches to path-style addressing, which MinIO
    /// and other S3-compatible services expect.
    pub fn new(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self, StorageError> {
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region
                .parse()
                .map_err(|_| StorageError::Backend(format!("invalid region: {region}")))?,
        };
        let credentials =
            Credentials::default().map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut bucket = Bucket::new(bucket, region, credentials)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if endpoint.is_some() {
            bucket = bucket.with_path_style();
        }
        Ok(Self { bucket })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        if key.trim().is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        match self.bucket.get_object(key).await {
            Ok(response) => Ok(response.bytes().to_vec()),
            Err(S3Error::HttpFailWithBody(404, _)) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}
