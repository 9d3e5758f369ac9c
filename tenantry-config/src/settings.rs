// Typed platform settings

use crate::validation::{ConfigValidator, Validate};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholders substituted into schema scripts.
pub const SCRIPT_PLACEHOLDERS: [&str; 3] = ["<database>", "<user>", "<password>"];

/// Root settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantryConfig {
    pub node: NodeSettings,
    pub lifecycle: LifecycleSettings,
    pub cache: CacheSettings,
    pub schema: SchemaSettings,
}

/// Cluster node identity and liveness timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub node_id: String,
    pub heartbeat_interval_ms: u64,
    pub dead_node_timeout_ms: u64,
    /// Number of recently seen tenant events remembered for deduplication
    pub dedup_window: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            node_id: format!("node-{}", std::process::id()),
            heartbeat_interval_ms: 5_000,
            dead_node_timeout_ms: 15_000,
            dedup_window: 1_024,
        }
    }
}

impl NodeSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn dead_node_timeout(&self) -> Duration {
        Duration::from_millis(self.dead_node_timeout_ms)
    }
}

/// Tenant load/unload timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub drain_poll_interval_ms: u64,
    pub drain_max_wait_ms: u64,
    /// In-flight requests tolerated when draining (the unload request itself)
    pub drain_floor: u64,
    pub daemon_shutdown_timeout_ms: u64,
    pub clear_cache_on_unload: bool,
    /// Parallel tenant loads at platform start; `None` uses available cores
    pub startup_concurrency: Option<usize>,
    pub reload_watch_interval_ms: u64,
    pub cache_sweep_interval_ms: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: 100,
            drain_max_wait_ms: 30_000,
            drain_floor: 1,
            daemon_shutdown_timeout_ms: 5_000,
            clear_cache_on_unload: true,
            startup_concurrency: None,
            reload_watch_interval_ms: 5_000,
            cache_sweep_interval_ms: 60_000,
        }
    }
}

impl LifecycleSettings {
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn drain_max_wait(&self) -> Duration {
        Duration::from_millis(self.drain_max_wait_ms)
    }

    pub fn daemon_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.daemon_shutdown_timeout_ms)
    }

    pub fn reload_watch_interval(&self) -> Duration {
        Duration::from_millis(self.reload_watch_interval_ms)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sweep_interval_ms)
    }
}

/// When a cache entry's time-to-live starts counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryBasis {
    /// TTL counts from insertion
    #[default]
    Creation,
    /// TTL restarts on every read
    Access,
}

/// Default per-tenant response cache shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_seconds: u64,
    pub max_entries: usize,
    pub expiry_basis: ExpiryBasis,
    pub statistics_enabled: bool,
    pub key_index_enabled: bool,
    /// Prefix eviction only matches at `/` or `|` boundaries
    pub boundary_prefix_match: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_entries: 10_000,
            expiry_basis: ExpiryBasis::Creation,
            statistics_enabled: true,
            key_index_enabled: false,
            boundary_prefix_match: true,
        }
    }
}

/// Per-binding schema provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    pub schema_prefix: Option<String>,
    pub password_salt: String,
    pub password_length: usize,
    pub probe_timeout_ms: u64,
    pub init_script: String,
    pub drop_script: String,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            schema_prefix: None,
            password_salt: "tenantry".to_string(),
            password_length: 24,
            probe_timeout_ms: 5_000,
            init_script: [
                "CREATE SCHEMA <database>;",
                "CREATE ROLE <user> LOGIN PASSWORD '<password>';",
                "GRANT ALL ON SCHEMA <database> TO <user>;",
            ]
            .join("\n"),
            drop_script: [
                "DROP SCHEMA IF EXISTS <database> CASCADE;",
                "DROP ROLE IF EXISTS <user>;",
            ]
            .join("\n"),
        }
    }
}

impl SchemaSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Validate for TenantryConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.node.node_id, "node.node_id")?;
        ConfigValidator::positive(self.node.heartbeat_interval_ms, "node.heartbeat_interval_ms")?;
        ConfigValidator::in_range(
            self.node.dead_node_timeout_ms,
            self.node.heartbeat_interval_ms,
            u64::MAX,
            "node.dead_node_timeout_ms",
        )?;

        ConfigValidator::positive(
            self.lifecycle.drain_poll_interval_ms,
            "lifecycle.drain_poll_interval_ms",
        )?;
        ConfigValidator::in_range(self.lifecycle.drain_floor, 0, 16, "lifecycle.drain_floor")?;
        ConfigValidator::positive(
            self.lifecycle.reload_watch_interval_ms,
            "lifecycle.reload_watch_interval_ms",
        )?;
        ConfigValidator::positive(
            self.lifecycle.cache_sweep_interval_ms,
            "lifecycle.cache_sweep_interval_ms",
        )?;
        if let Some(workers) = self.lifecycle.startup_concurrency {
            ConfigValidator::in_range(workers, 1, 1_024, "lifecycle.startup_concurrency")?;
        }

        ConfigValidator::positive(self.cache.max_entries as u64, "cache.max_entries")?;

        ConfigValidator::not_empty(&self.schema.password_salt, "schema.password_salt")?;
        ConfigValidator::in_range(self.schema.password_length, 8, 64, "schema.password_length")?;
        ConfigValidator::positive(self.schema.probe_timeout_ms, "schema.probe_timeout_ms")?;
        ConfigValidator::has_placeholders(
            &self.schema.init_script,
            &SCRIPT_PLACEHOLDERS,
            "schema.init_script",
        )?;
        ConfigValidator::has_placeholders(
            &self.schema.drop_script,
            &SCRIPT_PLACEHOLDERS[..1],
            "schema.drop_script",
        )?;

        Ok(())
    }
}
