use serde::Deserialize;

use crate::models::ReceiveOptions;

/// App-level queue configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Stream the embedding jobs arrive on. Default: "embedding_jobs".
    #[serde(default = "default_mq_stream")]
    pub stream: String,
    /// Consumer group name. Default: "embedding_workers".
    #[serde(default = "default_mq_group")]
    pub group: String,
    /// Consumer name within the group. Default: "worker-1".
    #[serde(default = "default_mq_consumer")]
    pub consumer: String,
    /// Long-poll wait per receive, in seconds. Default: 10.
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: u64,
    /// Messages fetched per receive. Default: 1.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Seconds before an unacknowledged message is redelivered. Default: 30.
    #[serde(default = "default_visibility_timeout_seconds")]
    pub visibility_timeout_seconds: u64,
    /// Sleep between empty receives to avoid a busy loop. Default: 0.2.
    #[serde(default = "default_idle_sleep_seconds")]
    pub idle_sleep_seconds: f64,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_stream() -> String {
    "embedding_jobs".into()
}
fn default_mq_group() -> String {
    "embedding_workers".into()
}
fn default_mq_consumer() -> String {
    "worker-1".into()
}
fn default_wait_time_seconds() -> u64 {
    10
}
fn default_max_messages() -> usize {
    1
}
fn default_visibility_timeout_seconds() -> u64 {
    30
}
fn default_idle_sleep_seconds() -> f64 {
    0.2
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            stream: default_mq_stream(),
            group: default_mq_group(),
            consumer: default_mq_consumer(),
            wait_time_seconds: default_wait_time_seconds(),
            max_messages: default_max_messages(),
            visibility_timeout_seconds: default_visibility_timeout_seconds(),
            idle_sleep_seconds: default_idle_sleep_seconds(),
        }
    }
}

impl MqAppConfig {
    /// The per-receive options this configuration describes.
    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            wait_time_seconds: self.wait_time_seconds,
            max_messages: self.max_messages,
            visibility_timeout_seconds: self.visibility_timeout_seconds,
        }
    }
}
