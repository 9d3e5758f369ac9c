//! Schema Provisioner
//!
//! Creates, detects and migrates the schema a binding owns.
//!
//! # Algorithm
//!
//! 1. No datasource declared: `NO_SCHEMA_NEEDED`.
//! 2. Resolve the root connection for the datasource's engine type. Missing,
//!    inactive or unreachable: `UNAVAILABLE`.
//! 3. Unmanaged root: reachability was all there is to check, `SUPPORTED`.
//! 4. Managed root: derive the binding's schema identity, create schema and
//!    role from the init template if the schema is absent, persist the
//!    binding's connection, then migrate. `MIGRATED` or `ERROR`.
//! 5. A failure after this call created the schema drops it again with the
//!    drop template and deletes the persisted connection. The outcome is
//!    audit-logged either way.
//!
//! Every engine call is bounded by the configured probe timeout.

use crate::engine::SchemaEngine;
use crate::error::{Result, SchemaError};
use crate::naming::{self, SchemaIdentity};
use crate::template::ScriptTemplate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tenantry_config::SchemaSettings;
use tenantry_core::{Binding, MigrationState, ModuleDescriptor, SchemaConnection, TenantStore};
use tenantry_log::audit;
use tracing::{debug, info, warn};

/// Provisioner tuning.
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    pub schema_prefix: Option<String>,
    pub password_salt: String,
    pub password_length: usize,
    pub probe_timeout: Duration,
    pub init_script: ScriptTemplate,
    pub drop_script: ScriptTemplate,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self::from(&SchemaSettings::default())
    }
}

impl From<&SchemaSettings> for ProvisionerSettings {
    fn from(settings: &SchemaSettings) -> Self {
        Self {
            schema_prefix: settings.schema_prefix.clone(),
            password_salt: settings.password_salt.clone(),
            password_length: settings.password_length,
            probe_timeout: settings.probe_timeout(),
            init_script: ScriptTemplate::new(settings.init_script.clone()),
            drop_script: ScriptTemplate::new(settings.drop_script.clone()),
        }
    }
}

/// What happened to a schema this call created, after a later failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollback {
    pub schema_dropped: bool,
    pub record_deleted: bool,
}

impl Rollback {
    pub fn is_clean(&self) -> bool {
        self.schema_dropped && self.record_deleted
    }
}

/// Outcome of [`SchemaProvisioner::provision_and_migrate`].
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub state: MigrationState,
    /// The binding's connection after provisioning, when it has one
    pub connection: Option<SchemaConnection>,
    pub failure: Option<String>,
    pub rollback: Option<Rollback>,
}

impl ProvisionReport {
    fn state(state: MigrationState) -> Self {
        Self {
            state,
            connection: None,
            failure: None,
            rollback: None,
        }
    }

    fn failed(state: MigrationState, failure: impl Into<String>) -> Self {
        Self {
            failure: Some(failure.into()),
            ..Self::state(state)
        }
    }

    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }
}

/// Provisions binding-owned schemas through a [`SchemaEngine`].
pub struct SchemaProvisioner {
    engine: Arc<dyn SchemaEngine>,
    store: Arc<dyn TenantStore>,
    roots: RwLock<HashMap<String, SchemaConnection>>,
    settings: ProvisionerSettings,
}

impl SchemaProvisioner {
    /// Create a new provisioner
    pub fn new(
        engine: Arc<dyn SchemaEngine>,
        store: Arc<dyn TenantStore>,
        settings: ProvisionerSettings,
    ) -> Self {
        Self {
            engine,
            store,
            roots: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &ProvisionerSettings {
        &self.settings
    }

    /// Register the root connection for its engine type, replacing any
    /// previous one.
    pub fn register_root(&self, root: SchemaConnection) {
        info!(engine = %root.engine_type, managed = root.managed, "root connection registered");
        self.roots.write().insert(root.engine_type.clone(), root);
    }

    pub fn root(&self, engine_type: &str) -> Option<SchemaConnection> {
        self.roots.read().get(engine_type).cloned()
    }

    /// Toggle a root connection without removing it.
    pub fn set_root_active(&self, engine_type: &str, active: bool) -> bool {
        match self.roots.write().get_mut(engine_type) {
            Some(root) => {
                root.active = active;
                true
            }
            None => false,
        }
    }

    /// Deterministic schema identity for a binding.
    pub fn identity_for(&self, tenant: &str, module: &str) -> SchemaIdentity {
        naming::identity(
            self.settings.schema_prefix.as_deref(),
            tenant,
            module,
            &self.settings.password_salt,
            self.settings.password_length,
        )
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.settings.probe_timeout, fut)
            .await
            .map_err(|_| SchemaError::Timeout {
                operation,
                after: self.settings.probe_timeout,
            })?
    }

    /// Probe a connection within the probe timeout.
    pub async fn check_reachability(&self, connection: &SchemaConnection) -> bool {
        match self.bounded("ping", self.engine.ping(connection)).await {
            Ok(()) => true,
            Err(e) => {
                debug!(url = %connection.url, error = %e, "connection unreachable");
                false
            }
        }
    }

    /// Probe the binding's own connection, record the result on the binding
    /// and persist it. Bindings without a connection are reachable.
    pub async fn refresh_reachability(&self, binding: &mut Binding) -> Result<bool> {
        let Some(mut connection) = binding.schema_connection.clone() else {
            return Ok(true);
        };

        let reachable = self.check_reachability(&connection).await;
        connection.mark_probed(reachable);
        self.store
            .save_schema_connection(&binding.tenant, &binding.module, &connection)
            .await?;
        binding.schema_connection = Some(connection);
        Ok(reachable)
    }

    /// Provision and migrate the schema `binding` owns.
    pub async fn provision_and_migrate(
        &self,
        binding: &Binding,
        module: &ModuleDescriptor,
    ) -> ProvisionReport {
        let tenant = binding.tenant.as_str();
        let module_name = binding.module.as_str();

        let Some(datasource) = module.datasource() else {
            return ProvisionReport::state(MigrationState::NoSchemaNeeded);
        };

        let Some(root) = self.root(&datasource.engine_type) else {
            warn!(tenant, module = module_name, engine = %datasource.engine_type, "no root connection");
            return ProvisionReport::failed(
                MigrationState::Unavailable,
                SchemaError::NoRoot(datasource.engine_type.clone()).to_string(),
            );
        };

        if !root.active || !self.check_reachability(&root).await {
            warn!(tenant, module = module_name, engine = %root.engine_type, "root connection unavailable");
            return ProvisionReport::failed(
                MigrationState::Unavailable,
                format!("root connection for '{}' is unavailable", root.engine_type),
            );
        }

        if !root.managed {
            return ProvisionReport {
                connection: binding.schema_connection.clone(),
                ..ProvisionReport::state(MigrationState::Supported)
            };
        }

        let identity = self.identity_for(tenant, module_name);

        let exists = match self
            .bounded("schema probe", self.engine.schema_exists(&root, &identity.database))
            .await
        {
            Ok(exists) => exists,
            Err(e) => return ProvisionReport::failed(MigrationState::Error, e.to_string()),
        };

        let mut created = false;
        if !exists {
            // From here on a failure may leave a partial schema behind.
            created = true;
            let script = self.settings.init_script.render_for(&identity);
            if let Err(e) = self
                .bounded("init script", self.engine.execute_script(&root, &script))
                .await
            {
                return self
                    .fail_after_create(tenant, module_name, &root, &identity, e)
                    .await;
            }
            info!(tenant, module = module_name, schema = %identity.database, "schema created");
        }

        let mut connection = SchemaConnection::new(
            root.engine_type.clone(),
            self.engine.schema_url(&root, &identity.database),
            identity.database.clone(),
            identity.user.clone(),
            identity.password.clone(),
        )
        .managed(true);
        connection.mark_probed(true);

        if let Err(e) = self
            .store
            .save_schema_connection(tenant, module_name, &connection)
            .await
        {
            let e = SchemaError::from(e);
            if created {
                return self
                    .fail_after_create(tenant, module_name, &root, &identity, e)
                    .await;
            }
            return ProvisionReport::failed(MigrationState::Error, e.to_string());
        }

        let locations = datasource.migration_locations();
        match self
            .bounded("migration", self.engine.migrate(&connection, &locations))
            .await
        {
            Ok(applied) => {
                debug!(tenant, module = module_name, applied, "migrations applied");
                connection.migration_state = MigrationState::Migrated;
                if let Err(e) = self
                    .store
                    .save_schema_connection(tenant, module_name, &connection)
                    .await
                {
                    warn!(tenant, module = module_name, error = %e, "could not record migration state");
                }
                ProvisionReport {
                    connection: Some(connection),
                    ..ProvisionReport::state(MigrationState::Migrated)
                }
            }
            Err(e) if created => {
                self.fail_after_create(tenant, module_name, &root, &identity, e)
                    .await
            }
            Err(e) => {
                warn!(tenant, module = module_name, error = %e, "migration failed");
                connection.migration_state = MigrationState::Error;
                if let Err(e) = self
                    .store
                    .save_schema_connection(tenant, module_name, &connection)
                    .await
                {
                    warn!(tenant, module = module_name, error = %e, "could not record migration state");
                }
                ProvisionReport {
                    connection: Some(connection),
                    ..ProvisionReport::failed(MigrationState::Error, e.to_string())
                }
            }
        }
    }

    async fn fail_after_create(
        &self,
        tenant: &str,
        module: &str,
        root: &SchemaConnection,
        identity: &SchemaIdentity,
        cause: SchemaError,
    ) -> ProvisionReport {
        let rollback = self.rollback(tenant, module, root, identity).await;
        audit!(
            level: WARN,
            tenant,
            module,
            schema = %identity.database,
            cause = %cause,
            schema_dropped = rollback.schema_dropped,
            record_deleted = rollback.record_deleted,
            "schema provisioning rolled back"
        );
        ProvisionReport {
            rollback: Some(rollback),
            ..ProvisionReport::failed(MigrationState::Error, cause.to_string())
        }
    }

    async fn rollback(
        &self,
        tenant: &str,
        module: &str,
        root: &SchemaConnection,
        identity: &SchemaIdentity,
    ) -> Rollback {
        let script = self.settings.drop_script.render_for(identity);
        let schema_dropped = match self
            .bounded("drop script", self.engine.execute_script(root, &script))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(tenant, module, schema = %identity.database, error = %e, "rollback drop failed");
                false
            }
        };

        let record_deleted = match self.store.delete_schema_connection(tenant, module).await {
            Ok(_) => true,
            Err(e) => {
                warn!(tenant, module, error = %e, "rollback could not delete schema connection");
                false
            }
        };

        Rollback {
            schema_dropped,
            record_deleted,
        }
    }

    /// Drop the managed schema a binding owns and delete its record.
    /// Returns `false` when there was nothing to drop.
    pub async fn drop_binding_schema(&self, binding: &Binding) -> Result<bool> {
        let Some(connection) = &binding.schema_connection else {
            return Ok(false);
        };
        if !connection.managed {
            return Ok(false);
        }

        let root = self
            .root(&connection.engine_type)
            .ok_or_else(|| SchemaError::NoRoot(connection.engine_type.clone()))?;

        let script = self.settings.drop_script.render(
            &connection.database,
            &connection.user,
            &connection.password,
        );
        let dropped = self
            .bounded("drop script", self.engine.execute_script(&root, &script))
            .await;

        audit!(
            tenant = %binding.tenant,
            module = %binding.module,
            schema = %connection.database,
            success = dropped.is_ok(),
            "binding schema dropped"
        );
        dropped?;

        self.store
            .delete_schema_connection(&binding.tenant, &binding.module)
            .await?;
        Ok(true)
    }
}
