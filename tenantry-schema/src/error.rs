use std::time::Duration;
use thiserror::Error;

/// Schema provisioning errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("No root connection registered for engine '{0}'")]
    NoRoot(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Store error: {0}")]
    Store(String),
}

impl From<tenantry_core::TenantError> for SchemaError {
    fn from(err: tenantry_core::TenantError) -> Self {
        SchemaError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
