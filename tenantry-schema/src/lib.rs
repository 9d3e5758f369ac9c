//! Tenantry schema provisioning.
//!
//! Each schema-backed binding owns one schema, created through a shared
//! root connection per engine type.
//!
//! - [`SchemaProvisioner`]: create-if-absent, migrate, compensating rollback
//! - [`SchemaEngine`]: database seam, with [`InMemorySchemaEngine`]
//! - [`naming`]: deterministic schema names and passwords
//! - [`ScriptTemplate`]: `<database>` / `<user>` / `<password>` substitution
//!
//! ```rust,ignore
//! use tenantry_schema::*;
//!
//! let provisioner = SchemaProvisioner::new(engine, store, ProvisionerSettings::default());
//! provisioner.register_root(root_connection.managed(true));
//!
//! let report = provisioner.provision_and_migrate(&binding, &module).await;
//! assert_eq!(report.state, MigrationState::Migrated);
//! ```

pub mod engine;
pub mod error;
pub mod naming;
pub mod provisioner;
pub mod template;

pub use engine::{Fault, InMemorySchemaEngine, SchemaEngine};
pub use error::{Result, SchemaError};
pub use naming::SchemaIdentity;
pub use provisioner::{ProvisionReport, ProvisionerSettings, Rollback, SchemaProvisioner};
pub use template::ScriptTemplate;
