//! Module Loader
//!
//! Validates module manifests, merges the artifacts of a tenant's bound
//! modules into one [`Environment`], and wires per-module contexts against
//! it.
//!
//! Deduplication is by artifact identity (file name). The first module to
//! contribute an identity owns it; later contributions are skipped with a
//! warning naming the owner. Migration scripts are namespaced per module
//! (`module/name`) and never collide across modules.

use crate::environment::{Entry, Environment};
use crate::error::{HookFailure, LoaderError, Result};
use crate::hooks::{self, HookContext, HookKind, ModuleHooks};
use crate::registry::{DispatchTable, PluginRegistry};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tenantry_core::{ArtifactKind, ArtifactSource, ModuleDescriptor, SchemaConnection};
use tracing::{debug, warn};

/// Result of merging a tenant's module artifacts.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub environment: Arc<Environment>,
    /// Identity to owning module, for diagnostics
    pub origins: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub dispatch: DispatchTable,
}

/// A module wired against an assembled environment.
#[derive(Clone)]
pub struct ModuleContext {
    pub hook_context: HookContext,
    pub hooks: Arc<dyn ModuleHooks>,
    pub schema_connection: Option<SchemaConnection>,
}

impl ModuleContext {
    pub fn module(&self) -> &str {
        &self.hook_context.module
    }

    pub async fn start(&self) -> std::result::Result<(), HookFailure> {
        hooks::invoke(self.hooks.as_ref(), HookKind::Start, &self.hook_context).await
    }

    pub async fn shutdown(&self) -> std::result::Result<(), HookFailure> {
        hooks::invoke(self.hooks.as_ref(), HookKind::Shutdown, &self.hook_context).await
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("tenant", &self.hook_context.tenant)
            .field("module", &self.hook_context.module)
            .field("schema_connection", &self.schema_connection)
            .finish()
    }
}

/// Builds tenant environments from module descriptors.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    registry: Arc<PluginRegistry>,
}

impl ModuleLoader {
    /// Create a loader resolving hooks through `registry`
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Check that a module's manifest is present and well formed. Path
    /// artifacts are probed through `tokio::fs`.
    pub async fn validate(&self, module: &ModuleDescriptor) -> Result<()> {
        let name = module.name.as_str();
        if name.trim().is_empty() {
            return Err(LoaderError::invalid(name, "module name is empty"));
        }
        if module.version.trim().is_empty() {
            return Err(LoaderError::invalid(name, "module version is empty"));
        }

        let manifest = module
            .manifest
            .as_ref()
            .ok_or_else(|| LoaderError::MissingManifest(name.to_string()))?;

        let mut shared = HashSet::new();
        let mut scripts = HashSet::new();
        for artifact in &manifest.artifacts {
            if artifact.name.trim().is_empty() {
                return Err(LoaderError::invalid(name, "artifact with empty name"));
            }

            let seen = if artifact.kind == ArtifactKind::MigrationScript {
                &mut scripts
            } else {
                &mut shared
            };
            if !seen.insert(artifact.identity().to_string()) {
                return Err(LoaderError::invalid(
                    name,
                    format!("artifact '{}' declared twice", artifact.identity()),
                ));
            }

            match &artifact.source {
                ArtifactSource::Bytes(bytes) if bytes.is_empty() => {
                    return Err(LoaderError::invalid(
                        name,
                        format!("artifact '{}' has no content", artifact.name),
                    ));
                }
                ArtifactSource::Path(path) if !tokio::fs::try_exists(path).await.unwrap_or(false) => {
                    return Err(LoaderError::invalid(
                        name,
                        format!("artifact '{}' not found at {}", artifact.name, path.display()),
                    ));
                }
                _ => {}
            }
        }

        if let Some(ds) = &manifest.datasource {
            if ds.engine_type.trim().is_empty() {
                return Err(LoaderError::invalid(name, "datasource engine type is empty"));
            }
            if ds.migration_location.trim().is_empty() {
                return Err(LoaderError::invalid(name, "datasource migration location is empty"));
            }
        }

        if let Some(key) = &module.hooks
            && !self.registry.contains(key)
        {
            return Err(LoaderError::UnknownHooks {
                module: name.to_string(),
                key: key.clone(),
            });
        }

        Ok(())
    }

    /// Merge the artifacts of `modules`, in order, into one environment.
    pub fn assemble_environment(&self, tenant: &str, modules: &[&ModuleDescriptor]) -> Assembly {
        let mut shared: BTreeMap<String, Entry> = BTreeMap::new();
        let mut migrations: BTreeMap<String, Entry> = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut dispatch = DispatchTable::default();

        for module in modules {
            if let Some(hooks) = module.hooks.as_deref().and_then(|k| self.registry.resolve(k)) {
                dispatch.insert(module.name.clone(), hooks);
            }

            let Some(manifest) = &module.manifest else {
                continue;
            };

            for artifact in &manifest.artifacts {
                let identity = artifact.identity().to_string();

                if artifact.kind == ArtifactKind::MigrationScript {
                    migrations
                        .entry(format!("{}/{}", module.name, identity))
                        .or_insert_with(|| Entry {
                            artifact: artifact.clone(),
                            owner: module.name.clone(),
                        });
                    continue;
                }

                match shared.get(&identity) {
                    Some(existing) => {
                        let message = format!(
                            "{} '{}' from module '{}' skipped: already provided by module '{}'",
                            artifact.kind, identity, module.name, existing.owner
                        );
                        warn!(tenant = %tenant, module = %module.name, owner = %existing.owner, artifact = %identity, "duplicate artifact skipped");
                        warnings.push(message);
                    }
                    None => {
                        shared.insert(
                            identity,
                            Entry {
                                artifact: artifact.clone(),
                                owner: module.name.clone(),
                            },
                        );
                    }
                }
            }
        }

        let origins = shared
            .iter()
            .map(|(identity, entry)| (identity.clone(), entry.owner.clone()))
            .collect();

        let environment = Environment::from_parts(tenant.to_string(), shared, migrations);
        debug!(tenant = %tenant, modules = modules.len(), artifacts = environment.len(), "environment assembled");

        Assembly {
            environment: Arc::new(environment),
            origins,
            warnings,
            dispatch,
        }
    }

    /// Wire one module against an assembled environment.
    pub fn build_context(
        &self,
        tenant: &str,
        module: &ModuleDescriptor,
        assembly: &Assembly,
        schema_connection: Option<SchemaConnection>,
        properties: BTreeMap<String, String>,
    ) -> Result<ModuleContext> {
        if let Some(manifest) = &module.manifest {
            for identity in &manifest.requires {
                let namespaced = format!("{}/{}", module.name, identity);
                if !assembly.environment.provides(identity)
                    && !assembly.environment.provides(&namespaced)
                {
                    return Err(LoaderError::MissingRequirement {
                        module: module.name.clone(),
                        identity: identity.clone(),
                    });
                }
            }
        }

        Ok(ModuleContext {
            hook_context: HookContext {
                tenant: tenant.to_string(),
                module: module.name.clone(),
                version: module.version.clone(),
                environment: Arc::clone(&assembly.environment),
                properties,
            },
            hooks: assembly.dispatch.get(&module.name),
            schema_connection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use tenantry_core::{Artifact, DatasourceDescriptor, ModuleManifest};

    fn loader() -> ModuleLoader {
        let registry = Arc::new(PluginRegistry::new());
        registry.register("noop", NoopHooks);
        ModuleLoader::new(registry)
    }

    fn jar(name: &str) -> Artifact {
        Artifact::bytes(ArtifactKind::Jar, name, b"PK".to_vec())
    }

    fn module(name: &str, artifacts: Vec<Artifact>) -> ModuleDescriptor {
        let manifest = artifacts
            .into_iter()
            .fold(ModuleManifest::new(), |m, a| m.with_artifact(a));
        ModuleDescriptor::new(name, "1.0.0").with_manifest(manifest)
    }

    #[tokio::test]
    async fn test_validate_accepts_well_formed() {
        let m = module("blog", vec![jar("blog.jar")]).with_hooks("noop");
        assert!(loader().validate(&m).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_manifest() {
        let m = ModuleDescriptor::new("blog", "1.0.0").without_manifest();
        assert_eq!(
            loader().validate(&m).await,
            Err(LoaderError::MissingManifest("blog".into()))
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_malformed() {
        let loader = loader();

        let dup = module("blog", vec![jar("a.jar"), jar("lib/a.jar")]);
        assert!(matches!(loader.validate(&dup).await, Err(LoaderError::InvalidManifest { .. })));

        let empty = module(
            "blog",
            vec![Artifact::bytes(ArtifactKind::Resource, "x.txt", Vec::new())],
        );
        assert!(loader.validate(&empty).await.is_err());

        let missing_file = module(
            "blog",
            vec![Artifact::path(ArtifactKind::Jar, "x.jar", "/definitely/not/here.jar")],
        );
        assert!(loader.validate(&missing_file).await.is_err());

        let bad_ds = ModuleDescriptor::new("blog", "1").with_manifest(
            ModuleManifest::new().with_datasource(DatasourceDescriptor::new("", "db")),
        );
        assert!(loader.validate(&bad_ds).await.is_err());

        let unknown_hooks = module("blog", vec![]).with_hooks("missing");
        assert!(matches!(
            loader.validate(&unknown_hooks).await,
            Err(LoaderError::UnknownHooks { .. })
        ));
    }

    #[tokio::test]
    async fn test_validate_accepts_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.jar");
        std::fs::write(&path, b"PK").unwrap();

        let m = module("blog", vec![Artifact::path(ArtifactKind::Jar, "blog.jar", &path)]);
        assert!(loader().validate(&m).await.is_ok());
    }

    #[test]
    fn test_first_contributor_wins() {
        let a = module("alpha", vec![jar("commons.jar"), jar("alpha.jar")]);
        let b = module("beta", vec![jar("commons.jar"), jar("beta.jar")]);

        let assembly = loader().assemble_environment("acme", &[&a, &b]);

        assert_eq!(assembly.environment.origin_of("commons.jar"), Some("alpha"));
        assert_eq!(assembly.environment.origin_of("beta.jar"), Some("beta"));
        assert_eq!(assembly.origins.len(), 3);
        assert_eq!(assembly.warnings.len(), 1);
        assert!(assembly.warnings[0].contains("'beta'"));
        assert!(assembly.warnings[0].contains("'alpha'"));
    }

    #[test]
    fn test_assembly_order_decides_owner() {
        let a = module("alpha", vec![jar("commons.jar")]);
        let b = module("beta", vec![jar("commons.jar")]);

        let assembly = loader().assemble_environment("acme", &[&b, &a]);
        assert_eq!(assembly.environment.origin_of("commons.jar"), Some("beta"));
    }

    #[test]
    fn test_migration_scripts_are_namespaced() {
        let script = |n: &str| Artifact::bytes(ArtifactKind::MigrationScript, n, b"--".to_vec());
        let a = module("alpha", vec![script("V1__init.sql")]);
        let b = module("beta", vec![script("V1__init.sql"), script("V2__more.sql")]);

        let assembly = loader().assemble_environment("acme", &[&a, &b]);

        assert!(assembly.warnings.is_empty());
        assert_eq!(assembly.environment.migration_scripts("alpha").count(), 1);
        assert_eq!(assembly.environment.migration_scripts("beta").count(), 2);
        assert!(assembly.environment.resolve("V1__init.sql").is_none());
    }

    #[test]
    fn test_build_context_checks_requirements() {
        let loader = loader();
        let provider = module("alpha", vec![jar("commons.jar")]);
        let mut consumer = module("beta", vec![]);
        if let Some(m) = consumer.manifest.as_mut() {
            m.requires.push("commons.jar".into());
        }

        let with_provider = loader.assemble_environment("acme", &[&provider, &consumer]);
        let ctx = loader
            .build_context("acme", &consumer, &with_provider, None, BTreeMap::new())
            .unwrap();
        assert_eq!(ctx.module(), "beta");

        let alone = loader.assemble_environment("acme", &[&consumer]);
        assert_eq!(
            loader
                .build_context("acme", &consumer, &alone, None, BTreeMap::new())
                .unwrap_err(),
            LoaderError::MissingRequirement {
                module: "beta".into(),
                identity: "commons.jar".into()
            }
        );
    }

    #[tokio::test]
    async fn test_context_dispatches_to_registered_hooks() {
        let loader = loader();
        let m = module("blog", vec![]).with_hooks("noop");
        let assembly = loader.assemble_environment("acme", &[&m]);

        assert_eq!(assembly.dispatch.modules().collect::<Vec<_>>(), vec!["blog"]);
        let ctx = loader
            .build_context("acme", &m, &assembly, None, BTreeMap::new())
            .unwrap();
        assert!(ctx.start().await.is_ok());
        assert!(ctx.shutdown().await.is_ok());
    }
}
