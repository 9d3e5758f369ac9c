//! Tenant Lifecycle Orchestrator
//!
//! Owns the tenant registry and every state transition. Loads and unloads of
//! one tenant are serialized through a per-tenant lock held for the whole
//! call; distinct tenants never contend.
//!
//! ```text
//! INACTIVE -> STARTING -> STARTED -> STOPPING -> {STOPPED | INACTIVE}
//! ```
//!
//! Loading an already started tenant tears it down first, so load and
//! reload are the same operation. See [`crate::bootstrap`] for the three
//! bootstrap phases.

use crate::builtin::{CacheSweeper, ReloadSignalWatcher};
use crate::daemon::{DaemonFactory, DaemonRegistry};
use crate::handle::TenantHandle;
use crate::observer::{LifecycleObserver, Phase};
use crate::peer::PeerEventHandler;
use crate::report::LoadReport;
use crate::requests::RequestGuard;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tenantry_cache::{CacheConfig, CacheManager, ResponseCache};
use tenantry_cluster::{ClusterCoordinator, ClusterEventType, InMemoryBus, MessageBus};
use tenantry_config::TenantryConfig;
use tenantry_core::{
    Binding, ErrorSet, InMemoryTenantStore, Result, SchemaConnection, TenantDefinition,
    TenantError, TenantState, TenantStore,
};
use tenantry_loader::{
    Environment, HookContext, HookFailure, HookKind, ModuleLoader, PluginRegistry, hooks,
};
use tenantry_log::audit;
use tenantry_schema::{InMemorySchemaEngine, ProvisionerSettings, SchemaEngine, SchemaProvisioner};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Builder for [`Orchestrator`].
///
/// Every collaborator defaults to its in-memory implementation.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: TenantryConfig,
    store: Option<Arc<dyn TenantStore>>,
    engine: Option<Arc<dyn SchemaEngine>>,
    plugins: Option<Arc<PluginRegistry>>,
    bus: Option<Arc<dyn MessageBus>>,
    roots: Vec<SchemaConnection>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    daemon_factories: Vec<Arc<dyn DaemonFactory>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: TenantryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn TenantStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn schema_engine(mut self, engine: Arc<dyn SchemaEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn plugins(mut self, plugins: Arc<PluginRegistry>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn message_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Root connection used to provision schemas of its engine type.
    pub fn root_connection(mut self, root: SchemaConnection) -> Self {
        self.roots.push(root);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn daemon_factory(mut self, factory: Arc<dyn DaemonFactory>) -> Self {
        self.daemon_factories.push(factory);
        self
    }

    pub fn build(self) -> Arc<Orchestrator> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTenantStore::new()));
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(InMemorySchemaEngine::new()));
        let plugins = self
            .plugins
            .unwrap_or_else(|| Arc::new(PluginRegistry::new()));
        let bus = self.bus.unwrap_or_else(|| Arc::new(InMemoryBus::default()));

        let provisioner = SchemaProvisioner::new(
            engine,
            store.clone(),
            ProvisionerSettings::from(&self.config.schema),
        );
        for root in self.roots {
            provisioner.register_root(root);
        }

        let caches = Arc::new(CacheManager::new());
        let cluster = Arc::new(ClusterCoordinator::new(self.config.node.clone(), bus));
        cluster.add_handler(Arc::new(PeerEventHandler::new(caches.clone())));

        Arc::new_cyclic(|self_ref| Orchestrator {
            config: self.config,
            store,
            loader: ModuleLoader::new(plugins),
            provisioner: Arc::new(provisioner),
            caches,
            cluster,
            registry: DashMap::new(),
            locks: DashMap::new(),
            observers: RwLock::new(self.observers),
            daemon_factories: RwLock::new(self.daemon_factories),
            shutdown: CancellationToken::new(),
            cluster_started: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }
}

/// Drives tenant lifecycles on one node.
pub struct Orchestrator {
    pub(crate) config: TenantryConfig,
    pub(crate) store: Arc<dyn TenantStore>,
    pub(crate) loader: ModuleLoader,
    pub(crate) provisioner: Arc<SchemaProvisioner>,
    caches: Arc<CacheManager>,
    cluster: Arc<ClusterCoordinator>,
    registry: DashMap<String, Arc<TenantHandle>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    observers: RwLock<Vec<Arc<dyn LifecycleObserver>>>,
    daemon_factories: RwLock<Vec<Arc<dyn DaemonFactory>>>,
    shutdown: CancellationToken,
    cluster_started: AtomicBool,
    self_ref: Weak<Orchestrator>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &TenantryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TenantStore> {
        &self.store
    }

    pub fn provisioner(&self) -> &Arc<SchemaProvisioner> {
        &self.provisioner
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        self.loader.registry()
    }

    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.caches
    }

    pub fn cluster(&self) -> &Arc<ClusterCoordinator> {
        &self.cluster
    }

    pub fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.write().push(observer);
    }

    pub fn add_daemon_factory(&self, factory: Arc<dyn DaemonFactory>) {
        self.daemon_factories.write().push(factory);
    }

    /// Live handle of a tenant that has been loaded at least once.
    pub fn tenant(&self, name: &str) -> Option<Arc<TenantHandle>> {
        self.registry.get(name).map(|entry| entry.value().clone())
    }

    pub fn tenants(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Current state; tenants never loaded are `Inactive`.
    pub fn state(&self, name: &str) -> TenantState {
        self.tenant(name)
            .map(|handle| handle.state())
            .unwrap_or(TenantState::Inactive)
    }

    pub fn cache(&self, name: &str) -> Option<Arc<ResponseCache>> {
        self.tenant(name).and_then(|handle| handle.cache())
    }

    /// Count a request against a started tenant until the guard drops.
    pub fn begin_request(&self, name: &str) -> Result<RequestGuard> {
        let handle = self
            .tenant(name)
            .ok_or_else(|| TenantError::NotFound(name.to_string()))?;
        let state = handle.state();
        if !state.is_serving() {
            return Err(TenantError::Invalid(format!(
                "tenant '{}' is {} and not serving",
                name, state
            )));
        }
        Ok(handle.begin_request())
    }

    fn tenant_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks.entry(name.to_string()).or_default().clone()
    }

    /// Load (or reload) a tenant.
    ///
    /// Returns the report of a started tenant, possibly with a degraded
    /// module set. A fatal bootstrap leaves the tenant `Inactive` and returns
    /// [`TenantError::Bootstrap`] carrying the binding errors.
    pub async fn load_tenant(&self, name: &str) -> Result<LoadReport> {
        let lock = self.tenant_lock(name);
        let _guard = lock.lock().await;
        self.load_locked(name).await
    }

    async fn load_locked(&self, name: &str) -> Result<LoadReport> {
        let definition = self
            .store
            .get_tenant(name)
            .await?
            .ok_or_else(|| TenantError::NotFound(name.to_string()))?;

        let existing = self.tenant(name);
        if let Some(handle) = &existing
            && handle.state() == TenantState::Started
        {
            debug!(tenant = %name, "Tenant already started, tearing down before reload");
            self.teardown(handle, false).await;
        }

        let handle = existing.unwrap_or_else(|| Arc::new(TenantHandle::new(definition.clone())));
        handle.set_definition(definition.clone());
        self.set_state(&handle, TenantState::Starting)?;
        let reloads = handle.count_reload();
        handle.take_reload_request();
        self.clear_reload_flags(name).await;
        info!(tenant = %name, reloads, "Loading tenant");

        let built = match self.bootstrap(&definition).await {
            Ok(built) => built,
            Err(e) => return Err(self.fail_bootstrap(&handle, e)),
        };

        let cache = self
            .caches
            .get_or_create(name, CacheConfig::from(&self.config.cache));
        let active_modules: Vec<String> = built
            .contexts
            .iter()
            .map(|ctx| ctx.module().to_string())
            .collect();
        handle.install(
            built.contexts,
            built.environment,
            built.migration_states.clone(),
            cache.clone(),
        );
        self.set_state(&handle, TenantState::Started)?;
        self.registry.insert(name.to_string(), handle.clone());
        self.start_daemons(&handle, cache);

        if built.errors.is_empty() {
            info!(tenant = %name, modules = active_modules.len(), "Tenant started");
        } else {
            warn!(
                tenant = %name,
                modules = active_modules.len(),
                failed = built.errors.len(),
                errors = %built.errors,
                "Tenant started with degraded module set"
            );
        }

        self.cluster
            .broadcast_lifecycle_event(name, ClusterEventType::TenantLoaded)
            .await;

        Ok(LoadReport {
            tenant: name.to_string(),
            state: TenantState::Started,
            active_modules,
            errors: built.errors,
            migration_states: built.migration_states,
            warnings: built.warnings,
            reloads,
        })
    }

    fn fail_bootstrap(&self, handle: &TenantHandle, cause: TenantError) -> TenantError {
        if let Err(e) = self.set_state(handle, TenantState::Inactive) {
            error!(tenant = %handle.name(), error = %e, "Could not mark tenant inactive");
        }

        let err = match cause {
            bootstrap @ TenantError::Bootstrap { .. } => bootstrap,
            other => TenantError::Bootstrap {
                tenant: handle.name().to_string(),
                reason: other.to_string(),
                errors: ErrorSet::new(),
            },
        };
        audit!(
            level: ERROR,
            tenant = %handle.name(),
            error = %err,
            binding_errors = err.binding_errors().map(ErrorSet::len).unwrap_or(0),
            "tenant bootstrap aborted"
        );
        err
    }

    /// Unload a tenant, optionally draining in-flight requests first.
    pub async fn unload_tenant(&self, name: &str, drain: bool) -> Result<()> {
        let lock = self.tenant_lock(name);
        let _guard = lock.lock().await;

        let handle = self
            .tenant(name)
            .ok_or_else(|| TenantError::NotFound(name.to_string()))?;
        self.teardown(&handle, drain).await;
        Ok(())
    }

    /// Stop a started tenant. Caller holds the tenant lock.
    async fn teardown(&self, handle: &TenantHandle, drain: bool) {
        let name = handle.name();
        if handle.state() != TenantState::Started {
            if let Some(daemons) = handle.take_daemons() {
                daemons.cancel_all(self.config.lifecycle.daemon_shutdown_timeout()).await;
            }
            debug!(tenant = %name, state = %handle.state(), "Tenant not started, nothing to unload");
            return;
        }

        if let Err(e) = self.set_state(handle, TenantState::Stopping) {
            warn!(tenant = %name, error = %e, "Unexpected state while unloading");
            return;
        }

        let lifecycle = &self.config.lifecycle;
        if drain {
            let outcome = handle
                .requests()
                .drain(
                    lifecycle.drain_floor,
                    lifecycle.drain_poll_interval(),
                    lifecycle.drain_max_wait(),
                )
                .await;
            if outcome.drained {
                debug!(tenant = %name, waited = ?outcome.waited, "Requests drained");
            } else {
                warn!(
                    tenant = %name,
                    remaining = outcome.remaining,
                    waited = ?outcome.waited,
                    "Drain timed out, unloading with requests in flight"
                );
            }
        }

        let contexts = handle.take_contexts();
        let results = futures::future::join_all(contexts.iter().map(|ctx| async move {
            (ctx.module().to_string(), ctx.shutdown().await)
        }))
        .await;
        for (module, result) in results {
            if let Err(failure) = result {
                warn!(tenant = %name, module = %module, error = %failure, "Module shutdown failed");
            }
        }

        if let Some(daemons) = handle.take_daemons() {
            let stragglers = daemons
                .cancel_all(lifecycle.daemon_shutdown_timeout())
                .await;
            if stragglers > 0 {
                warn!(tenant = %name, stragglers, "Daemons aborted after timeout");
            }
        }

        if lifecycle.clear_cache_on_unload {
            self.caches.clear(name);
        }

        let terminal = if handle.definition().active {
            TenantState::Stopped
        } else {
            TenantState::Inactive
        };
        if let Err(e) = self.set_state(handle, terminal) {
            warn!(tenant = %name, error = %e, "Could not record unloaded state");
        }
        info!(tenant = %name, state = %terminal, "Tenant unloaded");

        self.cluster
            .broadcast_lifecycle_event(name, ClusterEventType::TenantUnloaded)
            .await;
    }

    /// Delete a tenant: detach every binding (dropping owned schemas),
    /// delete its persisted definition, unload it and tell peers.
    pub async fn delete_tenant(&self, name: &str) -> Result<()> {
        let lock = self.tenant_lock(name);
        let outcome = {
            let _guard = lock.lock().await;
            self.delete_locked(name).await
        };
        drop(lock);
        if matches!(outcome, Ok(()) | Err(TenantError::NotFound(_))) {
            // Waiters hold a clone, so a contended lock stays put.
            self.locks
                .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
        }
        outcome
    }

    async fn delete_locked(&self, name: &str) -> Result<()> {
        let definition = self.store.get_tenant(name).await?;
        let handle = self.tenant(name);
        if definition.is_none() && handle.is_none() {
            return Err(TenantError::NotFound(name.to_string()));
        }

        let bindings = self.store.bindings(name).await?;
        let detached = bindings.len();
        for binding in bindings {
            self.detach_binding(name, binding).await?;
        }

        self.store.delete_tenant(name).await?;

        if let Some(handle) = &handle {
            self.teardown(handle, false).await;
            self.set_state(handle, TenantState::Deleted)?;
        }
        self.registry.remove(name);
        self.caches.destroy(name);

        audit!(tenant = %name, bindings = detached, "tenant deleted");
        self.cluster
            .broadcast_lifecycle_event(name, ClusterEventType::TenantDeleted)
            .await;
        Ok(())
    }

    /// Bind a catalog module to a tenant. A started tenant picks the module
    /// up on its next reload.
    pub async fn attach_module(&self, tenant: &str, module: &str) -> Result<()> {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().await;

        let definition = self
            .store
            .get_tenant(tenant)
            .await?
            .ok_or_else(|| TenantError::NotFound(tenant.to_string()))?;
        if self
            .store
            .get_module(module)
            .await?
            .is_none()
        {
            return Err(TenantError::ModuleNotFound(module.to_string()));
        }
        if let Some(existing) = self.store.get_binding(tenant, module).await?
            && !existing.marked_for_deletion
        {
            debug!(tenant = %tenant, module = %module, "Module already attached");
            return Ok(());
        }

        self.run_binding_hook(&definition, module, HookKind::Bind)
            .await
            .map_err(|failure| {
                TenantError::Invalid(format!(
                    "module '{}' refused binding to '{}': {}",
                    module, tenant, failure
                ))
            })?;

        self.store.save_binding(&Binding::new(tenant, module)).await?;
        if let Some(handle) = self.tenant(tenant)
            && handle.state().is_serving()
        {
            handle.request_reload();
        }
        info!(tenant = %tenant, module = %module, "Module attached");
        Ok(())
    }

    /// Unbind a module, dropping the schema its binding owns. Returns
    /// `false` if the module was not attached.
    pub async fn detach_module(&self, tenant: &str, module: &str) -> Result<bool> {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().await;

        let Some(binding) = self.store.get_binding(tenant, module).await? else {
            return Ok(false);
        };
        self.detach_binding(tenant, binding).await?;

        if let Some(handle) = self.tenant(tenant)
            && handle.state().is_serving()
        {
            handle.request_reload();
        }
        info!(tenant = %tenant, module = %module, "Module detached");
        Ok(true)
    }

    /// Caller holds the tenant lock.
    async fn detach_binding(&self, tenant: &str, mut binding: Binding) -> Result<()> {
        binding.marked_for_deletion = true;
        self.store.save_binding(&binding).await?;

        let definition = self
            .store
            .get_tenant(tenant)
            .await?
            .unwrap_or_else(|| TenantDefinition::new(tenant));
        if let Err(failure) = self
            .run_binding_hook(&definition, &binding.module, HookKind::Unbind)
            .await
        {
            warn!(tenant = %tenant, module = %binding.module, error = %failure, "Unbind hook failed");
        }

        // A failed drop leaves the binding marked for deletion so a retry can finish.
        self.provisioner
            .drop_binding_schema(&binding)
            .await
            .map_err(|e| {
                TenantError::Storage(format!(
                    "could not drop schema of module '{}': {}",
                    binding.module, e
                ))
            })?;

        self.store.remove_binding(tenant, &binding.module).await?;
        Ok(())
    }

    async fn run_binding_hook(
        &self,
        definition: &TenantDefinition,
        module: &str,
        kind: HookKind,
    ) -> std::result::Result<(), HookFailure> {
        let descriptor = match self.store.get_module(module).await {
            Ok(Some(descriptor)) => descriptor,
            _ => return Ok(()),
        };
        let Some(implementation) = descriptor
            .hooks
            .as_deref()
            .and_then(|key| self.loader.registry().resolve(key))
        else {
            return Ok(());
        };

        let environment = self
            .tenant(&definition.name)
            .and_then(|handle| handle.environment())
            .unwrap_or_else(|| Arc::new(Environment::empty(definition.name.clone())));
        let ctx = HookContext {
            tenant: definition.name.clone(),
            module: descriptor.name.clone(),
            version: descriptor.version.clone(),
            environment,
            properties: definition.properties.clone(),
        };
        hooks::invoke(implementation.as_ref(), kind, &ctx).await
    }

    /// Load every active persisted tenant, at most `startup_concurrency` at a
    /// time, and join the cluster.
    pub async fn start_all(self: &Arc<Self>) -> Result<BTreeMap<String, Result<LoadReport>>> {
        if !self.cluster_started.swap(true, Ordering::AcqRel) {
            self.cluster.start().await;
        }

        let tenants = self.store.list_tenants().await?;
        let permits = Arc::new(Semaphore::new(self.startup_concurrency()));

        let tasks: Vec<(String, tokio::task::JoinHandle<Result<LoadReport>>)> = tenants
            .into_iter()
            .filter(|tenant| tenant.active)
            .map(|tenant| {
                let this = self.clone();
                let permits = permits.clone();
                let name = tenant.name.clone();
                let task = tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| TenantError::Invalid("startup pool closed".to_string()))?;
                    this.load_tenant(&tenant.name).await
                });
                (name, task)
            })
            .collect();

        let mut results = BTreeMap::new();
        for (name, task) in tasks {
            let result = task
                .await
                .unwrap_or_else(|e| Err(TenantError::Invalid(format!("load task failed: {}", e))));
            if let Err(e) = &result {
                error!(tenant = %name, error = %e, "Tenant failed to start");
            }
            results.insert(name, result);
        }
        info!(
            tenants = results.len(),
            started = results.values().filter(|r| r.is_ok()).count(),
            "Platform startup finished"
        );
        Ok(results)
    }

    /// Best-effort unload of every tenant, bounded by `timeout`, then leave
    /// the cluster.
    pub async fn shutdown_all(&self, timeout: Duration) {
        let names = self.tenants();
        let unloads = names.iter().map(|name| async move {
            if let Err(e) = self.unload_tenant(name, true).await {
                warn!(tenant = %name, error = %e, "Unload during shutdown failed");
            }
        });
        if tokio::time::timeout(timeout, futures::future::join_all(unloads))
            .await
            .is_err()
        {
            warn!(?timeout, "Platform shutdown timed out, cancelling remaining daemons");
        }

        self.shutdown.cancel();
        if self.cluster_started.swap(false, Ordering::AcqRel) {
            self.cluster
                .shutdown(self.config.lifecycle.daemon_shutdown_timeout())
                .await;
        }
        info!("Platform shut down");
    }

    fn startup_concurrency(&self) -> usize {
        self.config
            .lifecycle
            .startup_concurrency
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1)
    }

    fn set_state(&self, handle: &TenantHandle, to: TenantState) -> Result<()> {
        let from = handle.transition(to)?;
        debug!(tenant = %handle.name(), %from, %to, "State changed");
        for observer in self.observers.read().iter() {
            observer.on_state_changed(handle.name(), from, to);
        }
        Ok(())
    }

    pub(crate) fn notify_phase_started(&self, tenant: &str, phase: Phase) {
        for observer in self.observers.read().iter() {
            observer.on_phase_started(tenant, phase);
        }
    }

    pub(crate) fn notify_phase_finished(
        &self,
        tenant: &str,
        phase: Phase,
        survivors: usize,
        failed: usize,
    ) {
        for observer in self.observers.read().iter() {
            observer.on_phase_finished(tenant, phase, survivors, failed);
        }
    }

    fn start_daemons(&self, handle: &Arc<TenantHandle>, cache: Arc<ResponseCache>) {
        let lifecycle = &self.config.lifecycle;
        let registry = DaemonRegistry::new(handle.name(), &self.shutdown);
        registry.spawn(Arc::new(ReloadSignalWatcher::new(
            self.self_ref.clone(),
            handle.name(),
            lifecycle.reload_watch_interval(),
        )));
        registry.spawn(Arc::new(CacheSweeper::new(
            cache,
            lifecycle.cache_sweep_interval(),
        )));
        for factory in self.daemon_factories.read().iter() {
            for daemon in factory.create(handle) {
                registry.spawn(daemon);
            }
        }
        debug!(tenant = %handle.name(), daemons = ?registry.names(), "Daemons started");
        *handle.daemons.lock() = Some(registry);
    }

    /// Whether a started tenant has been asked to reload.
    pub(crate) async fn reload_wanted(&self, name: &str) -> Result<bool> {
        let Some(handle) = self.tenant(name) else {
            return Ok(false);
        };
        if !handle.state().is_serving() {
            return Ok(false);
        }
        if handle.take_reload_request() {
            return Ok(true);
        }
        let bindings = self.store.bindings(name).await?;
        Ok(bindings.iter().any(|b| b.reload_required))
    }

    async fn clear_reload_flags(&self, name: &str) {
        let bindings = match self.store.bindings(name).await {
            Ok(bindings) => bindings,
            Err(e) => {
                warn!(tenant = %name, error = %e, "Could not read bindings to clear reload flags");
                return;
            }
        };
        for binding in bindings.iter().filter(|b| b.reload_required) {
            if let Err(e) = self
                .store
                .mark_reload_required(name, &binding.module, false)
                .await
            {
                warn!(tenant = %name, module = %binding.module, error = %e, "Could not clear reload flag");
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("node", &self.cluster.node_id())
            .field("tenants", &self.tenants())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_releases_tenant_lock() {
        let orchestrator = Orchestrator::builder().build();
        orchestrator
            .store()
            .save_tenant(&TenantDefinition::new("acme"))
            .await
            .unwrap();

        orchestrator.load_tenant("acme").await.unwrap();
        assert!(orchestrator.locks.contains_key("acme"));

        orchestrator.delete_tenant("acme").await.unwrap();
        assert!(!orchestrator.locks.contains_key("acme"));

        assert!(matches!(
            orchestrator.delete_tenant("ghost").await,
            Err(TenantError::NotFound(_))
        ));
        assert!(orchestrator.locks.is_empty());
    }

    #[tokio::test]
    async fn test_contended_lock_survives_delete() {
        let orchestrator = Orchestrator::builder().build();
        orchestrator
            .store()
            .save_tenant(&TenantDefinition::new("acme"))
            .await
            .unwrap();
        let waiter = orchestrator.tenant_lock("acme");

        orchestrator.delete_tenant("acme").await.unwrap();

        assert!(orchestrator.locks.contains_key("acme"));
        assert!(Arc::ptr_eq(&waiter, &orchestrator.tenant_lock("acme")));
    }
}
