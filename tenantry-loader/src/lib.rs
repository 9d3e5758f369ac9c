//! Tenantry module loading.
//!
//! - [`ModuleLoader`] validates manifests, assembles a tenant
//!   [`Environment`] with origin-tracked deduplication, and builds
//!   [`ModuleContext`]s
//! - [`PluginRegistry`] maps hook reference keys to [`ModuleHooks`]
//!   implementations; the loader snapshots it into a [`DispatchTable`]
//!   per assembly
//! - [`hooks::invoke`] runs a hook and folds `false`, errors and panics
//!   into one [`HookFailure`]
//!
//! ```rust,ignore
//! use tenantry_loader::*;
//!
//! let registry = Arc::new(PluginRegistry::new());
//! registry.register("blog", BlogHooks::default());
//!
//! let loader = ModuleLoader::new(registry);
//! loader.validate(&blog).await?;
//! let assembly = loader.assemble_environment("acme", &[&blog, &shop]);
//! for warning in &assembly.warnings {
//!     println!("{warning}");
//! }
//! ```

pub mod environment;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod registry;

pub use environment::{Entry, Environment};
pub use error::{HookFailure, LoaderError, Result};
pub use hooks::{HookContext, HookError, HookKind, ModuleHooks, NoopHooks};
pub use loader::{Assembly, ModuleContext, ModuleLoader};
pub use registry::{DispatchTable, PluginRegistry};
