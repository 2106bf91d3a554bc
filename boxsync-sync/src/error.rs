//! Error types for the sync layer.

use boxsync_cloud::CloudError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync and directory operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Target resolves outside the user root. Raised before any I/O.
    #[error("cannot navigate outside of the root directory: {0}")]
    PathEscape(String),

    /// Target exists neither locally nor remotely.
    #[error("does not exist locally or in the cloud: {0}")]
    NotFound(String),

    /// Target is missing or is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Remote store call failed.
    #[error("transport error: {0}")]
    Transport(#[from] CloudError),

    /// Local filesystem call failed.
    #[error("local filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Argument rejected before doing any work.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<boxsync_types::Error> for SyncError {
    fn from(err: boxsync_types::Error) -> Self {
        match err {
            boxsync_types::Error::PathEscape { path } => SyncError::PathEscape(path),
            other => SyncError::InvalidArgument(other.to_string()),
        }
    }
}

impl From<walkdir::Error> for SyncError {
    fn from(err: walkdir::Error) -> Self {
        SyncError::Io(err.into())
    }
}
