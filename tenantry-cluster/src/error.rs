// Error types for cluster coordination

use thiserror::Error;

/// Cluster coordination errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Event encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Message bus closed")]
    Closed,

    #[error("Handler failed: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
