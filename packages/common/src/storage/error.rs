use thiserror::Error;

/// Errors that can occur while fetching objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object exists under the given key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key is absolute, contains a `..` segment, or escapes the store root.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing service rejected the request.
    #[error("storage backend error: {0}")]
    Backend(String),
}
