//! Runtime handle of a loaded tenant.

use crate::daemon::DaemonRegistry;
use crate::requests::{RequestGuard, RequestTracker};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tenantry_cache::ResponseCache;
use tenantry_core::{MigrationState, Result, TenantDefinition, TenantError, TenantState};
use tenantry_loader::{Environment, ModuleContext};

/// Live state of one tenant, owned by the orchestrator.
///
/// Other components only get read accessors and request guards.
pub struct TenantHandle {
    name: String,
    definition: RwLock<TenantDefinition>,
    state: RwLock<TenantState>,
    contexts: RwLock<Vec<ModuleContext>>,
    environment: RwLock<Option<Arc<Environment>>>,
    migration_states: RwLock<BTreeMap<String, MigrationState>>,
    cache: RwLock<Option<Arc<ResponseCache>>>,
    pub(crate) daemons: Mutex<Option<DaemonRegistry>>,
    requests: RequestTracker,
    reloads: AtomicU64,
    reload_requested: AtomicBool,
}

impl TenantHandle {
    pub(crate) fn new(definition: TenantDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            definition: RwLock::new(definition),
            state: RwLock::new(TenantState::Inactive),
            contexts: RwLock::new(Vec::new()),
            environment: RwLock::new(None),
            migration_states: RwLock::new(BTreeMap::new()),
            cache: RwLock::new(None),
            daemons: Mutex::new(None),
            requests: RequestTracker::new(),
            reloads: AtomicU64::new(0),
            reload_requested: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> TenantDefinition {
        self.definition.read().clone()
    }

    pub(crate) fn set_definition(&self, definition: TenantDefinition) {
        *self.definition.write() = definition;
    }

    pub fn state(&self) -> TenantState {
        *self.state.read()
    }

    /// Move to `to`, returning the previous state.
    pub(crate) fn transition(&self, to: TenantState) -> Result<TenantState> {
        let mut state = self.state.write();
        let from = *state;
        if !from.can_transition_to(to) {
            return Err(TenantError::IllegalTransition {
                tenant: self.name.clone(),
                from,
                to,
            });
        }
        *state = to;
        Ok(from)
    }

    /// Names of the modules that survived the last bootstrap, in binding order.
    pub fn active_modules(&self) -> Vec<String> {
        self.contexts
            .read()
            .iter()
            .map(|ctx| ctx.module().to_string())
            .collect()
    }

    pub fn environment(&self) -> Option<Arc<Environment>> {
        self.environment.read().clone()
    }

    pub fn migration_states(&self) -> BTreeMap<String, MigrationState> {
        self.migration_states.read().clone()
    }

    pub fn cache(&self) -> Option<Arc<ResponseCache>> {
        self.cache.read().clone()
    }

    pub(crate) fn install(
        &self,
        contexts: Vec<ModuleContext>,
        environment: Arc<Environment>,
        migration_states: BTreeMap<String, MigrationState>,
        cache: Arc<ResponseCache>,
    ) {
        *self.contexts.write() = contexts;
        *self.environment.write() = Some(environment);
        *self.migration_states.write() = migration_states;
        *self.cache.write() = Some(cache);
    }

    /// Drop everything the last bootstrap built. Returns the module contexts
    /// so the caller can shut them down.
    pub(crate) fn take_contexts(&self) -> Vec<ModuleContext> {
        *self.environment.write() = None;
        std::mem::take(&mut *self.contexts.write())
    }

    pub(crate) fn take_daemons(&self) -> Option<DaemonRegistry> {
        self.daemons.lock().take()
    }

    pub fn daemon_names(&self) -> Vec<String> {
        self.daemons
            .lock()
            .as_ref()
            .map(|registry| registry.names())
            .unwrap_or_default()
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    pub fn in_flight(&self) -> u64 {
        self.requests.in_flight()
    }

    pub(crate) fn begin_request(&self) -> RequestGuard {
        self.requests.begin()
    }

    /// Completed and attempted loads so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    pub(crate) fn count_reload(&self) -> u64 {
        self.reloads.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Ask the reload watcher to rebuild this tenant.
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for TenantHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("active_modules", &self.active_modules())
            .field("in_flight", &self.in_flight())
            .field("reloads", &self.reload_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_follow_state_machine() {
        let handle = TenantHandle::new(TenantDefinition::new("acme"));
        assert_eq!(handle.state(), TenantState::Inactive);

        assert_eq!(handle.transition(TenantState::Starting).unwrap(), TenantState::Inactive);
        assert!(matches!(
            handle.transition(TenantState::Stopped),
            Err(TenantError::IllegalTransition { .. })
        ));
        handle.transition(TenantState::Started).unwrap();
        handle.transition(TenantState::Stopping).unwrap();
        handle.transition(TenantState::Stopped).unwrap();
        handle.transition(TenantState::Starting).unwrap();
    }

    #[test]
    fn test_reload_request_is_consumed() {
        let handle = TenantHandle::new(TenantDefinition::new("acme"));
        assert!(!handle.take_reload_request());
        handle.request_reload();
        assert!(handle.take_reload_request());
        assert!(!handle.take_reload_request());
    }
}
