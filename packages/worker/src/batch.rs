use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::context::AppContext;
use crate::handlers::embedding;

/// One record of a batch invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRecord {
    /// Caller-side identifier, echoed back when the record fails.
    pub id: String,
    /// Raw message body, same format as a polled queue message.
    pub body: String,
}

/// A fixed batch of records delivered in one invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub records: Vec<BatchRecord>,
}

/// Ids of the records that failed, in input order. Every id absent from the
/// list counts as acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub failed_ids: Vec<String>,
}

/// Process each record in isolation, mirroring the poll loop's ack-or-retry
/// decision as one aggregate result. Blank bodies are skipped, not failed.
pub async fn run_batch(ctx: &AppContext, request: &BatchRequest) -> BatchResult {
    let mut failed_ids = Vec::new();

    for record in &request.records {
        if record.body.trim().is_empty() {
            debug!(record_id = %record.id, "Blank record body, skipping");
            continue;
        }
        match embedding::process_body(ctx, &record.body).await {
            Ok(outcome) => {
                debug!(record_id = %record.id, outcome = ?outcome, "Record processed");
            }
            Err(e) => {
                error!(record_id = %record.id, error = %e, "Record processing failed");
                failed_ids.push(record.id.clone());
            }
        }
    }

    info!(
        total = request.records.len(),
        failed = failed_ids.len(),
        "Batch complete"
    );
    BatchResult { failed_ids }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::storage::{BlobStore, StorageError};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    use super::*;
    use crate::embed::MockEmbedder;
    use crate::entity::user_photo;

    struct FakeStore {
        objects: HashMap<String, Vec<u8>>,
    }

    impl FakeStore {
        fn with_object(key: &str, bytes: Vec<u8>) -> Self {
            let mut objects = HashMap::new();
            objects.insert(key.to_string(), bytes);
            Self { objects }
        }
    }

    #[async_trait]
    impl BlobStore for FakeStore {
        async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.objects
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }
    }

    fn record(id: &str, body: impl Into<String>) -> BatchRecord {
        BatchRecord {
            id: id.to_string(),
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn collects_only_failing_record_ids() {
        let valid_body = json!({
            "contestId": 7,
            "photoId": 42,
            "photoType": "USER",
            "storageKey": "users/42.jpg",
            "modelVersion": "openclip-vitb32-v1",
        })
        .to_string();
        let request = BatchRequest {
            records: vec![
                record("a", valid_body),
                record("b", "not even json"),
                record("c", "   "),
            ],
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_photo::Model { id: 42 }]])
            .append_exec_results([MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_encode()
            .returning(|_| Ok(vec![1.0, 0.0, 0.0]));
        let ctx = AppContext {
            db,
            store: Arc::new(FakeStore::with_object("users/42.jpg", b"jpeg".to_vec())),
            embedder: Arc::new(embedder),
        };

        let result = run_batch(&ctx, &request).await;

        assert_eq!(result.failed_ids, vec!["b"]);
    }

    #[test]
    fn result_serializes_with_camel_case_ids() {
        let result = BatchResult {
            failed_ids: vec!["1-0".to_string()],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failedIds"], json!(["1-0"]));
    }
}
