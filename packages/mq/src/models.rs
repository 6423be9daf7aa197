use async_trait::async_trait;

use crate::error::MqError;

/// One received queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Transport-assigned id, used for acks and failure reporting.
    pub id: String,
    /// Raw body as published, possibly still wrapped in a relay envelope.
    pub body: String,
}

/// Receive tuning, mirroring the long-poll surface of SQS-style queues.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// How long one receive may block waiting for messages, in seconds.
    /// Zero returns immediately.
    pub wait_time_seconds: u64,
    /// Upper bound on messages returned by one receive.
    pub max_messages: usize,
    /// Seconds a received-but-unacknowledged message stays hidden before the
    /// transport hands it to a consumer again.
    pub visibility_timeout_seconds: u64,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            wait_time_seconds: 10,
            max_messages: 1,
            visibility_timeout_seconds: 30,
        }
    }
}

/// A queue with explicit acknowledgment and passive retry.
///
/// Delivery is at-least-once: a message that is received but never acked
/// becomes visible again after the visibility timeout. Leaving a message
/// un-acked is the only retry mechanism.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Receive up to `options.max_messages` messages.
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>, MqError>;

    /// Acknowledge (delete) a processed message.
    async fn ack(&self, message: &QueueMessage) -> Result<(), MqError>;
}
