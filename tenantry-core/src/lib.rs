//! Tenantry core model.
//!
//! Shared vocabulary for the tenantry crates:
//!
//! - [`TenantDefinition`] / [`TenantState`]: persisted tenant configuration
//!   and its runtime lifecycle state machine
//! - [`ModuleDescriptor`] / [`ModuleManifest`]: catalog modules and the
//!   artifacts and datasource they declare
//! - [`Binding`] / [`SchemaConnection`] / [`MigrationState`]: a module
//!   attached to a tenant, and the schema it owns
//! - [`BindingError`] / [`ErrorSet`] / [`TenantError`]: per-binding and
//!   tenant-level failures
//! - [`TenantStore`]: persistence seam, with [`InMemoryTenantStore`]
//!
//! ```rust,ignore
//! use tenantry_core::*;
//!
//! let store = InMemoryTenantStore::new();
//! store.save_tenant(&TenantDefinition::new("acme")).await?;
//! store.save_module(&ModuleDescriptor::new("blog", "1.0.0")).await?;
//! store.save_binding(&Binding::new("acme", "blog")).await?;
//! ```

pub mod binding;
pub mod error;
pub mod module;
pub mod store;
pub mod tenant;

pub use binding::{Binding, MigrationState, SchemaConnection};
pub use error::{BindingError, BindingPhase, ErrorSet, Result, TenantError};
pub use module::{
    Artifact, ArtifactKind, ArtifactSource, DatasourceDescriptor, ModuleDescriptor, ModuleManifest,
};
pub use store::{InMemoryTenantStore, TenantStore};
pub use tenant::{TenantDefinition, TenantState};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::binding::{Binding, MigrationState, SchemaConnection};
    pub use crate::error::{BindingError, ErrorSet, TenantError};
    pub use crate::module::{Artifact, ArtifactKind, ModuleDescriptor, ModuleManifest};
    pub use crate::store::{InMemoryTenantStore, TenantStore};
    pub use crate::tenant::{TenantDefinition, TenantState};
}
