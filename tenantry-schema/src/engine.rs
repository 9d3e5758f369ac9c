//! Schema engine seam.
//!
//! Implement [`SchemaEngine`] over a real database driver and migration
//! tool. [`InMemorySchemaEngine`] models schemas, roles and applied
//! migrations in memory and can be told to fail, for tests.

use crate::error::{Result, SchemaError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tenantry_core::SchemaConnection;

/// Database operations the provisioner needs
#[async_trait]
pub trait SchemaEngine: Send + Sync {
    /// Check that `connection` is reachable
    async fn ping(&self, connection: &SchemaConnection) -> Result<()>;

    /// Check whether `schema` exists, using a root connection
    async fn schema_exists(&self, root: &SchemaConnection, schema: &str) -> Result<bool>;

    /// Run a rendered init or drop script with a root connection
    async fn execute_script(&self, root: &SchemaConnection, script: &str) -> Result<()>;

    /// Apply pending versioned migrations from `locations`, in order.
    /// Returns how many were newly applied.
    async fn migrate(&self, connection: &SchemaConnection, locations: &[&str]) -> Result<usize>;

    /// URL for a schema reachable through `root`
    fn schema_url(&self, root: &SchemaConnection, schema: &str) -> String {
        format!("{}/{}", root.url.trim_end_matches('/'), schema)
    }
}

/// Operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Ping,
    Exists,
    Init,
    Migrate,
    Drop,
}

#[derive(Debug, Default)]
struct EngineState {
    schemas: BTreeSet<String>,
    roles: BTreeMap<String, String>,
    applied: HashMap<String, BTreeSet<String>>,
    unreachable: HashSet<String>,
    faults: HashSet<Fault>,
    sticky_faults: HashSet<Fault>,
    latency: Option<Duration>,
    init_runs: usize,
    drop_runs: usize,
    scripts: Vec<String>,
}

impl EngineState {
    fn take_fault(&mut self, fault: Fault) -> Result<()> {
        if self.sticky_faults.contains(&fault) || self.faults.remove(&fault) {
            return Err(SchemaError::Engine(format!("injected {:?} failure", fault)));
        }
        Ok(())
    }
}

/// In-memory engine for tests and local development
///
/// Understands scripts made of `CREATE SCHEMA x`, `CREATE ROLE u ...
/// PASSWORD 'p'`, `DROP SCHEMA [IF EXISTS] x` and `DROP ROLE [IF EXISTS] u`
/// statements; anything else is recorded and ignored.
#[derive(Debug, Default)]
pub struct InMemorySchemaEngine {
    state: Mutex<EngineState>,
}

impl InMemorySchemaEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call of `fault`'s operation.
    pub fn fail_next(&self, fault: Fault) {
        self.state.lock().faults.insert(fault);
    }

    /// Fail every call of `fault`'s operation until cleared.
    pub fn fail_always(&self, fault: Fault) {
        self.state.lock().sticky_faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.faults.clear();
        state.sticky_faults.clear();
    }

    /// Make every connection to `url` unreachable (or reachable again).
    pub fn set_reachable(&self, url: &str, reachable: bool) {
        let mut state = self.state.lock();
        if reachable {
            state.unreachable.remove(url);
        } else {
            state.unreachable.insert(url.to_string());
        }
    }

    /// Delay every operation, to exercise probe timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    /// Seed an existing schema.
    pub fn create_schema(&self, schema: &str) {
        self.state.lock().schemas.insert(schema.to_string());
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.state.lock().schemas.contains(schema)
    }

    pub fn has_role(&self, user: &str) -> bool {
        self.state.lock().roles.contains_key(user)
    }

    pub fn schemas(&self) -> Vec<String> {
        self.state.lock().schemas.iter().cloned().collect()
    }

    pub fn init_runs(&self) -> usize {
        self.state.lock().init_runs
    }

    pub fn drop_runs(&self) -> usize {
        self.state.lock().drop_runs
    }

    /// Locations applied to `schema`.
    pub fn applied_migrations(&self, schema: &str) -> Vec<String> {
        self.state
            .lock()
            .applied
            .get(schema)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every script executed, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().scripts.clone()
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_reachable(state: &EngineState, connection: &SchemaConnection) -> Result<()> {
        if state.unreachable.contains(&connection.url) {
            return Err(SchemaError::Engine(format!(
                "connection refused: {}",
                connection.url
            )));
        }
        Ok(())
    }
}

fn apply_statement(state: &mut EngineState, statement: &str) -> Result<()> {
    let words: Vec<&str> = statement.split_whitespace().collect();
    let upper: Vec<String> = words.iter().map(|w| w.to_uppercase()).collect();
    let upper: Vec<&str> = upper.iter().map(String::as_str).collect();
    let name = |i: usize| words.get(i).map(|w| w.to_string()).unwrap_or_default();

    match upper.as_slice() {
        ["CREATE", "SCHEMA", "IF", "NOT", "EXISTS", ..] => {
            state.schemas.insert(name(5));
        }
        ["CREATE", "SCHEMA", ..] => {
            let schema = name(2);
            if !state.schemas.insert(schema.clone()) {
                return Err(SchemaError::Engine(format!("schema {} already exists", schema)));
            }
        }
        ["CREATE", "ROLE", ..] => {
            let password = upper
                .iter()
                .position(|w| *w == "PASSWORD")
                .map(|i| name(i + 1).trim_matches('\'').to_string())
                .unwrap_or_default();
            state.roles.insert(name(2), password);
        }
        ["DROP", "SCHEMA", "IF", "EXISTS", ..] => {
            let schema = name(4);
            state.schemas.remove(&schema);
            state.applied.remove(&schema);
        }
        ["DROP", "SCHEMA", ..] => {
            let schema = name(2);
            if !state.schemas.remove(&schema) {
                return Err(SchemaError::Engine(format!("schema {} does not exist", schema)));
            }
            state.applied.remove(&schema);
        }
        ["DROP", "ROLE", "IF", "EXISTS", ..] => {
            state.roles.remove(&name(4));
        }
        ["DROP", "ROLE", ..] => {
            state.roles.remove(&name(2));
        }
        _ => {}
    }
    Ok(())
}

#[async_trait]
impl SchemaEngine for InMemorySchemaEngine {
    async fn ping(&self, connection: &SchemaConnection) -> Result<()> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault(Fault::Ping)?;
        Self::check_reachable(&state, connection)
    }

    async fn schema_exists(&self, root: &SchemaConnection, schema: &str) -> Result<bool> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault(Fault::Exists)?;
        Self::check_reachable(&state, root)?;
        Ok(state.schemas.contains(schema))
    }

    async fn execute_script(&self, root: &SchemaConnection, script: &str) -> Result<()> {
        self.delay().await;
        let mut state = self.state.lock();
        Self::check_reachable(&state, root)?;

        let is_drop = script.trim_start().to_uppercase().starts_with("DROP");
        if is_drop {
            state.take_fault(Fault::Drop)?;
            state.drop_runs += 1;
        } else {
            state.take_fault(Fault::Init)?;
            state.init_runs += 1;
        }
        state.scripts.push(script.to_string());

        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            apply_statement(&mut state, statement)?;
        }
        Ok(())
    }

    async fn migrate(&self, connection: &SchemaConnection, locations: &[&str]) -> Result<usize> {
        self.delay().await;
        let mut state = self.state.lock();
        Self::check_reachable(&state, connection)?;
        state.take_fault(Fault::Migrate)?;

        if !state.schemas.contains(&connection.database) {
            return Err(SchemaError::Engine(format!(
                "schema {} does not exist",
                connection.database
            )));
        }

        let applied = state.applied.entry(connection.database.clone()).or_default();
        let fresh = locations
            .iter()
            .filter(|loc| applied.insert(loc.to_string()))
            .count();
        Ok(fresh)
    }
}
