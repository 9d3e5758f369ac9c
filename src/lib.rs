// Tenantry - tenant lifecycle and resource orchestration for Rust
//
// Loads tenants as sets of module bindings, provisions their schemas,
// caches their responses and keeps peer nodes informed of lifecycle changes.

// Re-export the orchestrator and the data model
pub use tenantry_core::*;
pub use tenantry_lifecycle::{
    Daemon, DaemonError, DaemonFactory, LifecycleObserver, LoadReport, Orchestrator,
    OrchestratorBuilder, Phase, RequestGuard, TenantHandle,
};

// Re-export member crates
pub use tenantry_cache as cache;
pub use tenantry_cluster as cluster;
pub use tenantry_config as config;
pub use tenantry_lifecycle as lifecycle;
pub use tenantry_loader as loader;
pub use tenantry_log as log;
pub use tenantry_schema as schema;

pub use tenantry_log::audit;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Binding,
        BindingError,
        ErrorSet,
        InMemoryTenantStore,
        LifecycleObserver,
        LoadReport,
        ModuleDescriptor,
        ModuleManifest,
        Orchestrator,
        SchemaConnection,
        TenantDefinition,
        TenantError,
        TenantState,
        TenantStore,
    };
    pub use tenantry_config::TenantryConfig;
    pub use tenantry_loader::{HookContext, HookError, ModuleHooks, PluginRegistry};
}
