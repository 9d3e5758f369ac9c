//! Error taxonomy.
//!
//! Per-binding failures are values collected into an [`ErrorSet`]; only
//! bootstrap-fatal problems surface as [`TenantError`].

use crate::TenantState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bootstrap phase (or hook) in which a binding failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingPhase {
    Validation,
    Assembly,
    Provisioning,
    Activation,
    Deactivation,
    Unbind,
}

impl std::fmt::Display for BindingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Assembly => write!(f, "assembly"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Activation => write!(f, "activation"),
            Self::Deactivation => write!(f, "deactivation"),
            Self::Unbind => write!(f, "unbind"),
        }
    }
}

/// A failure scoped to a single binding.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{phase} failed for module '{module}': {reason}")]
pub struct BindingError {
    pub module: String,
    pub phase: BindingPhase,
    pub reason: String,
}

impl BindingError {
    pub fn new(module: impl Into<String>, phase: BindingPhase, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            phase,
            reason: reason.into(),
        }
    }

    pub fn validation(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(module, BindingPhase::Validation, reason)
    }

    pub fn assembly(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(module, BindingPhase::Assembly, reason)
    }

    pub fn provisioning(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(module, BindingPhase::Provisioning, reason)
    }

    pub fn activation(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(module, BindingPhase::Activation, reason)
    }
}

/// Aggregated non-fatal binding errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSet {
    errors: Vec<BindingError>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: BindingError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ErrorSet) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BindingError> {
        self.errors.iter()
    }

    /// Errors recorded in one phase.
    pub fn in_phase(&self, phase: BindingPhase) -> impl Iterator<Item = &BindingError> {
        self.errors.iter().filter(move |e| e.phase == phase)
    }

    /// Whether any error names `module`.
    pub fn contains_module(&self, module: &str) -> bool {
        self.errors.iter().any(|e| e.module == module)
    }

    /// Rendered messages, for administration surfaces.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

impl std::fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

impl IntoIterator for ErrorSet {
    type Item = BindingError;
    type IntoIter = std::vec::IntoIter<BindingError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorSet {
    type Item = &'a BindingError;
    type IntoIter = std::slice::Iter<'a, BindingError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl FromIterator<BindingError> for ErrorSet {
    fn from_iter<I: IntoIterator<Item = BindingError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

/// Tenant-level errors
#[derive(Error, Debug)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid tenant operation: {0}")]
    Invalid(String),

    #[error("Tenant '{tenant}' cannot move from {from} to {to}")]
    IllegalTransition {
        tenant: String,
        from: TenantState,
        to: TenantState,
    },

    #[error("Bootstrap of tenant '{tenant}' aborted: {reason}")]
    Bootstrap {
        tenant: String,
        reason: String,
        errors: ErrorSet,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl TenantError {
    /// Binding errors carried by a fatal bootstrap error.
    pub fn binding_errors(&self) -> Option<&ErrorSet> {
        match self {
            TenantError::Bootstrap { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TenantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_error_display() {
        let err = BindingError::activation("blog", "start hook returned false");
        assert_eq!(
            err.to_string(),
            "activation failed for module 'blog': start hook returned false"
        );
    }

    #[test]
    fn test_error_set_queries() {
        let set: ErrorSet = vec![
            BindingError::validation("a", "no manifest"),
            BindingError::activation("b", "boom"),
            BindingError::activation("c", "boom"),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 3);
        assert_eq!(set.in_phase(BindingPhase::Activation).count(), 2);
        assert!(set.contains_module("a"));
        assert!(!set.contains_module("d"));
        assert!(set.to_string().contains("; "));
    }

    #[test]
    fn test_bootstrap_error_carries_set() {
        let mut errors = ErrorSet::new();
        errors.push(BindingError::activation("blog", "boom"));
        let err = TenantError::Bootstrap {
            tenant: "acme".into(),
            reason: "no module survived activation".into(),
            errors,
        };

        assert_eq!(err.binding_errors().map(ErrorSet::len), Some(1));
        assert!(err.to_string().contains("acme"));
    }
}
