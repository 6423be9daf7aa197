use async_trait::async_trait;
use redis::RedisResult;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use crate::error::MqError;
use crate::models::{QueueMessage, QueueSource, ReceiveOptions};

/// Stream entry field that carries the message body.
const BODY_FIELD: &str = "body";

/// Redis Streams implementation of [`QueueSource`].
///
/// One consumer group per stream; the visibility timeout maps onto the
/// pending-entry idle time: before reading new entries, any entry that has
/// been pending longer than the timeout is claimed back and redelivered.
pub struct RedisStreamSource {
    conn: ConnectionManager,
    stream: String,
    group: String,
    consumer: String,
}

impl RedisStreamSource {
    /// Connect and ensure the consumer group exists.
    pub async fn connect(
        url: &str,
        stream: &str,
        group: &str,
        consumer: &str,
    ) -> Result<Self, MqError> {
        let client = redis::Client::open(url).map_err(|e| MqError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| MqError::Connection(e.to_string()))?;

        let source = Self {
            conn,
            stream: stream.to_string(),
            group: group.to_string(),
            consumer: consumer.to_string(),
        };
        source.init_group().await?;
        Ok(source)
    }

    async fn init_group(&self) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(stream = %self.stream, group = %self.group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream = %self.stream, group = %self.group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim entries whose previous delivery went past the visibility
    /// timeout without an ack. These are redelivered before new entries.
    async fn claim_expired(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>, MqError> {
        let mut conn = self.conn.clone();
        let min_idle_ms = options.visibility_timeout_seconds * 1000;

        let pending: RedisResult<Vec<(String, String, i64, i64)>> = redis::cmd("XPENDING")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("-")
            .arg("+")
            .arg(options.max_messages)
            .query_async(&mut conn)
            .await;

        let pending = match pending {
            Ok(p) => p,
            Err(e) if e.to_string().contains("NOGROUP") => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let expired: Vec<String> = pending
            .into_iter()
            .filter(|(_, _, idle_ms, _)| *idle_ms >= min_idle_ms as i64)
            .map(|(id, _, _, _)| id)
            .collect();

        if expired.is_empty() {
            return Ok(Vec::new());
        }

        // XCLAIM re-checks the idle time, so an entry another consumer just
        // claimed is skipped instead of stolen.
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.stream)
            .arg(&self.group)
            .arg(&self.consumer)
            .arg(min_idle_ms);
        for id in &expired {
            cmd.arg(id);
        }

        let entries: Vec<(String, Vec<(String, String)>)> = cmd.query_async(&mut conn).await?;
        let messages = parse_entries(entries);
        if !messages.is_empty() {
            warn!(
                count = messages.len(),
                "Reclaimed messages past the visibility timeout"
            );
        }
        Ok(messages)
    }
}

#[async_trait]
impl QueueSource for RedisStreamSource {
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>, MqError> {
        let reclaimed = self.claim_expired(options).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(&self.group).arg(&self.consumer);
        // BLOCK 0 would block forever; a zero wait means "return immediately".
        if options.wait_time_seconds > 0 {
            cmd.arg("BLOCK").arg(options.wait_time_seconds * 1000);
        }
        cmd.arg("COUNT")
            .arg(options.max_messages)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(">");

        type StreamReply = Option<Vec<(String, Vec<(String, Vec<(String, String)>)>)>>;
        let result: RedisResult<StreamReply> = cmd.query_async(&mut conn).await;

        match result {
            Ok(Some(streams)) => Ok(streams
                .into_iter()
                .flat_map(|(_, entries)| parse_entries(entries))
                .collect()),
            Ok(None) => Ok(Vec::new()),
            Err(e) if e.to_string().contains("NOGROUP") => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let acked: i64 = redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.group)
            .arg(&message.id)
            .query_async(&mut conn)
            .await
            .map_err(|e| MqError::AckFailed(e.to_string()))?;

        if acked == 0 {
            warn!(message_id = %message.id, "Ack had no effect; entry was already acked or claimed");
        } else {
            debug!(message_id = %message.id, "Acknowledged message");
        }
        Ok(())
    }
}

/// Map raw stream entries to messages. An entry without a body field becomes
/// a blank-body message, which the consumer skips and acks.
fn parse_entries(entries: Vec<(String, Vec<(String, String)>)>) -> Vec<QueueMessage> {
    entries
        .into_iter()
        .map(|(id, fields)| {
            let body = fields
                .into_iter()
                .find(|(key, _)| key == BODY_FIELD)
                .map(|(_, value)| value)
                .unwrap_or_default();
            QueueMessage { id, body }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_body_field() {
        let entries = vec![(
            "1700000000000-0".to_string(),
            vec![("body".to_string(), r#"{"contestId": 1}"#.to_string())],
        )];
        let messages = parse_entries(entries);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "1700000000000-0");
        assert_eq!(messages[0].body, r#"{"contestId": 1}"#);
    }

    #[test]
    fn ignores_extra_fields() {
        let entries = vec![(
            "1-0".to_string(),
            vec![
                ("trace".to_string(), "abc".to_string()),
                ("body".to_string(), "payload".to_string()),
            ],
        )];
        let messages = parse_entries(entries);
        assert_eq!(messages[0].body, "payload");
    }

    #[test]
    fn missing_body_becomes_blank() {
        let entries = vec![("2-0".to_string(), vec![("x".to_string(), "y".to_string())])];
        let messages = parse_entries(entries);
        assert_eq!(messages[0].body, "");
    }
}
