pub mod envelope;
pub mod job;
pub mod photo_type;
pub mod storage;

pub use job::{EmbeddingJob, ValidationError};
pub use photo_type::PhotoType;
