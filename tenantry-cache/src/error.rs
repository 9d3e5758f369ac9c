//! Cache error types.

use thiserror::Error;

/// Cache operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache was destroyed while the operation was pending.
    #[error("Cache destroyed: {0}")]
    Destroyed(String),

    /// Prefix eviction needs a Tokio runtime to host its worker.
    #[error("No Tokio runtime available for the eviction worker")]
    NoRuntime,

    /// The eviction worker stopped before answering.
    #[error("Eviction worker stopped")]
    WorkerGone,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
