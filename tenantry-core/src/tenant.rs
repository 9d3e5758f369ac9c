//! Tenant definitions and the lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted tenant configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantDefinition {
    /// Unique tenant name
    pub name: String,

    /// Host identity the tenant answers for
    pub host: String,

    /// Free-form properties
    pub properties: BTreeMap<String, String>,

    /// Whether the tenant should be running
    pub active: bool,
}

impl TenantDefinition {
    /// Create a new active tenant definition
    ///
    /// # Examples
    ///
    /// ```
    /// use tenantry_core::TenantDefinition;
    ///
    /// let tenant = TenantDefinition::new("acme").with_host("acme.example.com");
    /// assert!(tenant.active);
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            host: name.clone(),
            name,
            properties: BTreeMap::new(),
            active: true,
        }
    }

    /// Set host identity
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Runtime lifecycle state of a tenant.
///
/// ```text
/// INACTIVE -> STARTING -> STARTED -> STOPPING -> {STOPPED | INACTIVE}
/// ```
///
/// Any failure while starting or stopping falls back to `Inactive`.
/// `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantState {
    #[default]
    Inactive,
    Starting,
    Started,
    Stopping,
    Stopped,
    Deleted,
}

impl TenantState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: TenantState) -> bool {
        use TenantState::*;
        matches!(
            (self, next),
            (Inactive, Starting)
                | (Stopped, Starting)
                | (Starting, Started)
                | (Starting, Inactive)
                | (Started, Stopping)
                | (Stopping, Stopped)
                | (Stopping, Inactive)
                | (Started, Deleted)
                | (Stopped, Deleted)
                | (Inactive, Deleted)
        )
    }

    /// Whether the tenant can serve requests in this state.
    pub fn is_serving(self) -> bool {
        self == TenantState::Started
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TenantState::Inactive => "INACTIVE",
            TenantState::Starting => "STARTING",
            TenantState::Started => "STARTED",
            TenantState::Stopping => "STOPPING",
            TenantState::Stopped => "STOPPED",
            TenantState::Deleted => "DELETED",
        }
    }
}

impl std::fmt::Display for TenantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder() {
        let tenant = TenantDefinition::new("acme")
            .with_host("acme.example.com")
            .with_property("locale", "en")
            .with_active(false);

        assert_eq!(tenant.name, "acme");
        assert_eq!(tenant.host, "acme.example.com");
        assert_eq!(tenant.properties.get("locale").map(String::as_str), Some("en"));
        assert!(!tenant.active);
    }

    #[test]
    fn test_happy_path_transitions() {
        use TenantState::*;
        let path = [Inactive, Starting, Started, Stopping, Stopped, Starting];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_illegal_transitions() {
        use TenantState::*;
        assert!(!Inactive.can_transition_to(Started));
        assert!(!Started.can_transition_to(Starting));
        assert!(!Starting.can_transition_to(Deleted));
        assert!(!Deleted.can_transition_to(Starting));
        assert!(!Deleted.can_transition_to(Inactive));
    }

    #[test]
    fn test_state_serde() {
        assert_eq!(
            serde_json::to_string(&TenantState::Stopping).unwrap(),
            "\"STOPPING\""
        );
        assert_eq!(TenantState::default(), TenantState::Inactive);
    }
}
