//! Outcome of a tenant load.

use std::collections::BTreeMap;
use tenantry_core::{ErrorSet, MigrationState, TenantState};

/// What a successful [`load_tenant`](crate::Orchestrator::load_tenant) produced.
///
/// A tenant can reach `Started` with a degraded module set; `errors` lists
/// every binding that was excluded and why.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub tenant: String,
    pub state: TenantState,
    pub active_modules: Vec<String>,
    pub errors: ErrorSet,
    pub migration_states: BTreeMap<String, MigrationState>,
    /// Artifact deduplication notices from environment assembly
    pub warnings: Vec<String>,
    pub reloads: u64,
}

impl LoadReport {
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}
