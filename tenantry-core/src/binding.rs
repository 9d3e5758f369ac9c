//! Tenant/module bindings and their schema connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a provisioning or migration attempt.
///
/// Always re-derived from a live probe; a stored value is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationState {
    /// Module declares no datasource
    NoSchemaNeeded,
    /// Unmanaged root is reachable; schema is owned elsewhere
    Supported,
    /// Root connection missing, inactive or unreachable
    Unavailable,
    Migrated,
    #[default]
    NotMigrated,
    Error,
}

impl MigrationState {
    /// Whether the binding can run against this state.
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            MigrationState::NoSchemaNeeded | MigrationState::Supported | MigrationState::Migrated
        )
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoSchemaNeeded => "NO_SCHEMA_NEEDED",
            Self::Supported => "SUPPORTED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Migrated => "MIGRATED",
            Self::NotMigrated => "NOT_MIGRATED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Database connection descriptor.
///
/// Either a shared root connection (one per engine type, used only to
/// provision) or a managed per-binding schema owned by exactly one binding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConnection {
    pub engine_type: String,
    pub url: String,
    /// Schema (database) name
    pub database: String,
    pub user: String,
    pub password: String,
    /// Root connections: whether schema creation is owned by us
    pub managed: bool,
    /// Mirrors the last reachability probe
    pub active: bool,
    pub migration_state: MigrationState,
    pub last_checked: Option<DateTime<Utc>>,
}

impl SchemaConnection {
    /// Create an active connection descriptor
    pub fn new(
        engine_type: impl Into<String>,
        url: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            engine_type: engine_type.into(),
            url: url.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            managed: false,
            active: true,
            migration_state: MigrationState::NotMigrated,
            last_checked: None,
        }
    }

    pub fn managed(mut self, managed: bool) -> Self {
        self.managed = managed;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Record a reachability probe result.
    pub fn mark_probed(&mut self, reachable: bool) {
        self.active = reachable;
        self.last_checked = Some(Utc::now());
    }
}

// Passwords stay out of logs.
impl std::fmt::Debug for SchemaConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaConnection")
            .field("engine_type", &self.engine_type)
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("managed", &self.managed)
            .field("active", &self.active)
            .field("migration_state", &self.migration_state)
            .finish()
    }
}

/// Association of one module to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub tenant: String,
    pub module: String,
    pub active: bool,
    pub marked_for_deletion: bool,
    pub reload_required: bool,
    /// Owned schema, if the module is schema-backed and provisioned
    pub schema_connection: Option<SchemaConnection>,
    pub created_at: DateTime<Utc>,
}

impl Binding {
    /// Create an active binding
    pub fn new(tenant: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            module: module.into(),
            active: true,
            marked_for_deletion: false,
            reload_required: false,
            schema_connection: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_schema_connection(mut self, connection: SchemaConnection) -> Self {
        self.schema_connection = Some(connection);
        self
    }

    /// Whether the binding takes part in a bootstrap.
    pub fn is_candidate(&self) -> bool {
        self.active && !self.marked_for_deletion
    }
}
