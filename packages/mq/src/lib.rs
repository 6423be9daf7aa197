pub mod config;
pub mod error;
pub mod models;
pub mod redis_source;

pub use config::MqAppConfig;
pub use error::MqError;
pub use models::{QueueMessage, QueueSource, ReceiveOptions};
pub use redis_source::RedisStreamSource;
