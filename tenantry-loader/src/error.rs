use thiserror::Error;

/// Module loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("Module '{0}' has no resource manifest")]
    MissingManifest(String),

    #[error("Module '{module}' has a malformed manifest: {reason}")]
    InvalidManifest { module: String, reason: String },

    #[error("Module '{module}' references unknown hooks '{key}'")]
    UnknownHooks { module: String, key: String },

    #[error("Module '{module}' requires '{identity}' which the environment does not provide")]
    MissingRequirement { module: String, identity: String },
}

impl LoaderError {
    pub(crate) fn invalid(module: &str, reason: impl Into<String>) -> Self {
        LoaderError::InvalidManifest {
            module: module.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a lifecycle hook did not succeed.
///
/// Callers treat every variant as "the module failed this hook".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookFailure {
    #[error("{hook} hook returned false")]
    Declined { hook: &'static str },

    #[error("{hook} hook failed: {reason}")]
    Failed { hook: &'static str, reason: String },

    #[error("{hook} hook panicked: {reason}")]
    Panicked { hook: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, LoaderError>;
