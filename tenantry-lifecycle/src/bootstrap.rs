//! Three-phase tenant bootstrap.
//!
//! 1. **Validation**: every candidate binding is checked concurrently. The
//!    module must be in the catalog, its manifest must validate and its
//!    schema connection, if any, must answer a probe.
//! 2. **Assembly**: surviving modules are merged into one environment in
//!    binding order, then schemas are provisioned and migrated concurrently
//!    and a module context is wired per binding.
//! 3. **Activation**: start hooks run concurrently. A module whose start
//!    hook fails is shut down again and excluded.
//!
//! Each phase is a barrier: the next begins only when every binding has
//! finished the current one. Failures exclude single bindings; the bootstrap
//! itself fails only when a mandatory datasource cannot be provisioned or no
//! binding survives.

use crate::observer::Phase;
use crate::orchestrator::Orchestrator;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tenantry_core::{
    Binding, BindingError, ErrorSet, MigrationState, ModuleDescriptor, Result, TenantDefinition,
    TenantError,
};
use tenantry_loader::{Environment, ModuleContext};
use tracing::{debug, warn};

/// Everything a successful bootstrap hands back to the orchestrator.
pub(crate) struct Built {
    pub contexts: Vec<ModuleContext>,
    pub environment: Arc<Environment>,
    pub migration_states: BTreeMap<String, MigrationState>,
    pub errors: ErrorSet,
    pub warnings: Vec<String>,
}

type Validated = (Binding, ModuleDescriptor);

impl Orchestrator {
    pub(crate) async fn bootstrap(&self, definition: &TenantDefinition) -> Result<Built> {
        let tenant = definition.name.as_str();
        let candidates: Vec<Binding> = self
            .store
            .bindings(tenant)
            .await?
            .into_iter()
            .filter(Binding::is_candidate)
            .collect();
        let candidate_count = candidates.len();
        let mut errors = ErrorSet::new();

        if candidates.is_empty() {
            debug!(tenant = %tenant, "No active bindings");
        }

        // Validation
        self.notify_phase_started(tenant, Phase::Validation);
        let validated = join_all(candidates.into_iter().map(|b| self.validate_binding(b))).await;
        let mut survivors: Vec<Validated> = Vec::with_capacity(validated.len());
        for outcome in validated {
            match outcome {
                Ok(valid) => survivors.push(valid),
                Err(e) => {
                    warn!(tenant = %tenant, module = %e.module, reason = %e.reason, "Binding failed validation");
                    errors.push(e);
                }
            }
        }
        self.notify_phase_finished(tenant, Phase::Validation, survivors.len(), errors.len());
        ensure_survivors(tenant, candidate_count, survivors.len(), &errors)?;

        // Assembly
        self.notify_phase_started(tenant, Phase::Assembly);
        let failed_before = errors.len();
        let (assembled, environment, warnings) =
            self.assemble(definition, survivors, &mut errors).await?;
        let mut migration_states = BTreeMap::new();
        for (ctx, state) in &assembled {
            migration_states.insert(ctx.module().to_string(), *state);
        }
        self.notify_phase_finished(
            tenant,
            Phase::Assembly,
            assembled.len(),
            errors.len() - failed_before,
        );
        ensure_survivors(tenant, candidate_count, assembled.len(), &errors)?;

        // Activation
        self.notify_phase_started(tenant, Phase::Activation);
        let failed_before = errors.len();
        let started = join_all(assembled.into_iter().map(|(ctx, _)| async move {
            match ctx.start().await {
                Ok(()) => Ok(ctx),
                Err(failure) => {
                    if let Err(e) = ctx.shutdown().await {
                        debug!(module = %ctx.module(), error = %e, "Shutdown after failed start also failed");
                    }
                    Err(BindingError::activation(ctx.module(), failure.to_string()))
                }
            }
        }))
        .await;
        let mut contexts = Vec::with_capacity(started.len());
        for outcome in started {
            match outcome {
                Ok(ctx) => contexts.push(ctx),
                Err(e) => {
                    warn!(tenant = %tenant, module = %e.module, reason = %e.reason, "Module failed to start");
                    migration_states.remove(&e.module);
                    errors.push(e);
                }
            }
        }
        self.notify_phase_finished(
            tenant,
            Phase::Activation,
            contexts.len(),
            errors.len() - failed_before,
        );
        ensure_survivors(tenant, candidate_count, contexts.len(), &errors)?;

        Ok(Built {
            contexts,
            environment,
            migration_states,
            errors,
            warnings,
        })
    }

    async fn validate_binding(
        &self,
        mut binding: Binding,
    ) -> std::result::Result<Validated, BindingError> {
        let module = match self.store.get_module(&binding.module).await {
            Ok(Some(module)) => module,
            Ok(None) => {
                return Err(BindingError::validation(
                    &binding.module,
                    "module is not in the catalog",
                ));
            }
            Err(e) => return Err(BindingError::validation(&binding.module, e.to_string())),
        };

        self.loader
            .validate(&module)
            .await
            .map_err(|e| BindingError::validation(&binding.module, e.to_string()))?;

        match self.provisioner.refresh_reachability(&mut binding).await {
            Ok(true) => Ok((binding, module)),
            Ok(false) => Err(BindingError::validation(
                &binding.module,
                "schema connection is unreachable",
            )),
            Err(e) => Err(BindingError::validation(&binding.module, e.to_string())),
        }
    }

    /// Merge the environment, provision schemas and wire contexts. Returns
    /// the contexts in binding order with their migration state.
    async fn assemble(
        &self,
        definition: &TenantDefinition,
        survivors: Vec<Validated>,
        errors: &mut ErrorSet,
    ) -> Result<(Vec<(ModuleContext, MigrationState)>, Arc<Environment>, Vec<String>)> {
        let tenant = definition.name.as_str();
        let modules: Vec<&ModuleDescriptor> = survivors.iter().map(|(_, m)| m).collect();
        let assembly = self.loader.assemble_environment(tenant, &modules);

        let reports = join_all(
            survivors
                .iter()
                .map(|(binding, module)| self.provisioner.provision_and_migrate(binding, module)),
        )
        .await;

        let mut assembled = Vec::with_capacity(survivors.len());
        for ((binding, module), report) in survivors.into_iter().zip(reports) {
            if !report.is_usable() {
                let reason = report
                    .failure
                    .clone()
                    .unwrap_or_else(|| format!("schema is {}", report.state));
                let error = BindingError::provisioning(&binding.module, reason);

                if module.datasource().is_some_and(|ds| ds.mandatory) {
                    errors.push(error);
                    return Err(TenantError::Bootstrap {
                        tenant: tenant.to_string(),
                        reason: format!(
                            "mandatory datasource of module '{}' could not be provisioned",
                            binding.module
                        ),
                        errors: errors.clone(),
                    });
                }
                warn!(tenant = %tenant, module = %binding.module, state = %report.state, "Schema provisioning failed");
                errors.push(error);
                continue;
            }

            let connection = report.connection.or(binding.schema_connection);
            match self.loader.build_context(
                tenant,
                &module,
                &assembly,
                connection,
                definition.properties.clone(),
            ) {
                Ok(ctx) => assembled.push((ctx, report.state)),
                Err(e) => {
                    warn!(tenant = %tenant, module = %binding.module, error = %e, "Module context could not be built");
                    errors.push(BindingError::assembly(&binding.module, e.to_string()));
                }
            }
        }

        Ok((assembled, assembly.environment, assembly.warnings))
    }
}

fn ensure_survivors(
    tenant: &str,
    candidates: usize,
    survivors: usize,
    errors: &ErrorSet,
) -> Result<()> {
    if candidates > 0 && survivors == 0 {
        return Err(TenantError::Bootstrap {
            tenant: tenant.to_string(),
            reason: format!("none of {} bindings survived", candidates),
            errors: errors.clone(),
        });
    }
    Ok(())
}
