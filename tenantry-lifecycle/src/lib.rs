//! Tenant lifecycle orchestration.
//!
//! The [`Orchestrator`] loads, reloads, unloads and deletes tenants. A load
//! runs a three-phase bootstrap (validation, assembly, activation) over the
//! tenant's module bindings; bindings that fail are excluded and reported
//! while the rest of the tenant starts. Unloads drain in-flight requests
//! before module shutdown hooks run.
//!
//! ```rust,ignore
//! use tenantry_lifecycle::Orchestrator;
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(config)
//!     .store(store)
//!     .plugins(plugins)
//!     .build();
//!
//! let report = orchestrator.load_tenant("acme").await?;
//! if report.is_degraded() {
//!     eprintln!("{}", report.errors);
//! }
//!
//! let _guard = orchestrator.begin_request("acme")?;
//! // ... serve ...
//!
//! orchestrator.unload_tenant("acme", true).await?;
//! ```
//!
//! Every loaded tenant runs a reload watcher and a cache sweeper; further
//! daemons come from registered [`DaemonFactory`] implementations.

mod bootstrap;
pub mod builtin;
pub mod daemon;
pub mod handle;
pub mod observer;
pub mod orchestrator;
pub mod peer;
pub mod report;
pub mod requests;

pub use builtin::{CACHE_SWEEPER, CacheSweeper, RELOAD_WATCHER, ReloadSignalWatcher};
pub use daemon::{Daemon, DaemonError, DaemonFactory, DaemonRegistry};
pub use handle::TenantHandle;
pub use observer::{LifecycleObserver, Phase};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use peer::PeerEventHandler;
pub use report::LoadReport;
pub use requests::{DrainOutcome, RequestGuard, RequestTracker};
