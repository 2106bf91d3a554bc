//! Object storage error types.

use thiserror::Error;

/// Result type for object storage operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur talking to an object store.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("S3 operation failed: {0}")]
    S3(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("object is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloudError {
    /// Returns true if the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}
