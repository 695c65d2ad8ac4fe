//! Node service error types.

use crate::client::ClientError;

/// Errors from the node service and its snapshot store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// `start` was called while periodic refresh is already scheduled
    #[error("service is already started")]
    AlreadyStarted,

    /// `stop` was called while nothing is scheduled
    #[error("service is not started")]
    NotStarted,

    /// Refresh interval must be non-zero
    #[error("refresh interval must be greater than zero")]
    InvalidInterval,

    /// Fetching a batch failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Reading or writing a snapshot failed
    #[error("snapshot error: {message}")]
    Snapshot { message: String },
}
