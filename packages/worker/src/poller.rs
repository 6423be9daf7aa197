use std::time::Duration;

use mq::{MqAppConfig, QueueMessage, QueueSource, ReceiveOptions};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::error::Result;
use crate::handlers::embedding;

/// Backoff after a failed receive, so a dead broker is retried instead of
/// spun on.
const RECEIVE_RETRY_SLEEP: Duration = Duration::from_secs(1);

/// Continuous consume loop: receive, process, ack, repeat until `shutdown`
/// flips to true.
pub async fn run_poll_loop<S: QueueSource>(
    ctx: &AppContext,
    source: &S,
    cfg: &MqAppConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let options = cfg.receive_options();
    let idle_sleep = Duration::from_secs_f64(cfg.idle_sleep_seconds);
    info!(
        stream = %cfg.stream,
        group = %cfg.group,
        consumer = %cfg.consumer,
        "Polling for embedding jobs"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        // A shutdown mid-receive cancels the in-flight poll; anything not yet
        // acked is redelivered after the visibility timeout.
        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = poll_once(ctx, source, &options) => received,
        };
        match received {
            Ok(0) => tokio::time::sleep(idle_sleep).await,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Receive failed");
                tokio::time::sleep(RECEIVE_RETRY_SLEEP).await;
            }
        }
    }
}

/// One receive plus processing of everything it returned. Returns how many
/// messages were received, not how many succeeded: each message is handled in
/// isolation, and a failure only affects that message's ack.
pub async fn poll_once<S: QueueSource>(
    ctx: &AppContext,
    source: &S,
    options: &ReceiveOptions,
) -> Result<usize> {
    let messages = source.receive(options).await?;
    for message in &messages {
        handle_message(ctx, source, message).await;
    }
    Ok(messages.len())
}

async fn handle_message<S: QueueSource>(ctx: &AppContext, source: &S, message: &QueueMessage) {
    if message.body.trim().is_empty() {
        info!(message_id = %message.id, "Blank message body, acking without processing");
        ack(source, message).await;
        return;
    }

    match embedding::process_body(ctx, &message.body).await {
        Ok(outcome) => {
            info!(message_id = %message.id, outcome = ?outcome, "Message processed");
            ack(source, message).await;
        }
        Err(e) => {
            // No ack: the message becomes visible again and is retried.
            error!(message_id = %message.id, error = %e, "Message processing failed, leaving for redelivery");
        }
    }
}

async fn ack<S: QueueSource>(source: &S, message: &QueueMessage) {
    if let Err(e) = source.ack(message).await {
        warn!(message_id = %message.id, error = %e, "Ack failed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use common::storage::{BlobStore, StorageError};
    use mq::{MqAppConfig, MqError, QueueMessage, QueueSource, ReceiveOptions};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use serde_json::json;
    use tokio::sync::watch;

    use super::{poll_once, run_poll_loop};
    use crate::context::AppContext;
    use crate::embed::MockEmbedder;
    use crate::entity::user_photo;

    struct ScriptedSource {
        messages: Mutex<Vec<QueueMessage>>,
        acked: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn with_messages(messages: Vec<QueueMessage>) -> Self {
            Self {
                messages: Mutex::new(messages),
                acked: Mutex::new(Vec::new()),
            }
        }

        fn acked_ids(&self) -> Vec<String> {
            self.acked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueueSource for ScriptedSource {
        async fn receive(&self, _options: &ReceiveOptions) -> Result<Vec<QueueMessage>, MqError> {
            Ok(std::mem::take(&mut *self.messages.lock().unwrap()))
        }

        async fn ack(&self, message: &QueueMessage) -> Result<(), MqError> {
            self.acked.lock().unwrap().push(message.id.clone());
            Ok(())
        }
    }

    struct FakeStore {
        objects: HashMap<String, Vec<u8>>,
    }

    impl FakeStore {
        fn empty() -> Self {
            Self {
                objects: HashMap::new(),
            }
        }

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

    fn message(id: &str, body: impl Into<String>) -> QueueMessage {
        QueueMessage {
            id: id.to_string(),
            body: body.into(),
        }
    }

    fn test_ctx(db: DatabaseConnection, store: FakeStore, embedder: MockEmbedder) -> AppContext {
        AppContext {
            db,
            store: Arc::new(store),
            embedder: Arc::new(embedder),
        }
    }

    #[tokio::test]
    async fn blank_bodies_are_acked_without_processing() {
        let source = ScriptedSource::with_messages(vec![message("1-0", "   ")]);
        // No embedder expectations and no scripted statements: touching either
        // would fail the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let ctx = test_ctx(db, FakeStore::empty(), MockEmbedder::new());

        let received = poll_once(&ctx, &source, &ReceiveOptions::default())
            .await
            .unwrap();

        assert_eq!(received, 1);
        assert_eq!(source.acked_ids(), vec!["1-0"]);
    }

    #[tokio::test]
    async fn failed_messages_are_left_for_redelivery() {
        let source =
            ScriptedSource::with_messages(vec![message("1-0", "{}"), message("2-0", "   ")]);
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let ctx = test_ctx(db, FakeStore::empty(), MockEmbedder::new());

        let received = poll_once(&ctx, &source, &ReceiveOptions::default())
            .await
            .unwrap();

        // The invalid payload stays un-acked; the blank one after it is still
        // handled.
        assert_eq!(received, 2);
        assert_eq!(source.acked_ids(), vec!["2-0"]);
    }

    #[tokio::test]
    async fn processed_messages_are_acked() {
        let body = json!({
            "contestId": 7,
            "photoId": 42,
            "photoType": "USER",
            "storageKey": "users/42.jpg",
            "modelVersion": "openclip-vitb32-v1",
        })
        .to_string();
        let source = ScriptedSource::with_messages(vec![message("1-0", body)]);

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
        let store = FakeStore::with_object("users/42.jpg", b"jpeg bytes".to_vec());
        let ctx = test_ctx(db, store, embedder);

        let received = poll_once(&ctx, &source, &ReceiveOptions::default())
            .await
            .unwrap();

        assert_eq!(received, 1);
        assert_eq!(source.acked_ids(), vec!["1-0"]);
    }

    #[tokio::test]
    async fn loop_stops_once_shutdown_is_signalled() {
        let source = ScriptedSource::with_messages(Vec::new());
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let ctx = test_ctx(db, FakeStore::empty(), MockEmbedder::new());
        let (_tx, rx) = watch::channel(true);

        tokio::time::timeout(
            Duration::from_secs(1),
            run_poll_loop(&ctx, &source, &MqAppConfig::default(), rx),
        )
        .await
        .expect("loop should stop once shutdown is signalled");
    }
}
