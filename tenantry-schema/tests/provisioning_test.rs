//! Provisioning tests against the in-memory engine

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tenantry_core::*;
use tenantry_core::Result;
use tenantry_schema::*;

const ROOT_URL: &str = "pg://root";

struct Fixture {
    engine: Arc<InMemorySchemaEngine>,
    store: Arc<InMemoryTenantStore>,
    provisioner: SchemaProvisioner,
}

async fn fixture(managed: bool) -> Fixture {
    let engine = Arc::new(InMemorySchemaEngine::new());
    let store = Arc::new(InMemoryTenantStore::new());
    store.save_tenant(&TenantDefinition::new("acme")).await.unwrap();
    store.save_binding(&Binding::new("acme", "blog")).await.unwrap();

    let settings = ProvisionerSettings {
        probe_timeout: Duration::from_millis(200),
        ..ProvisionerSettings::default()
    };
    let provisioner = SchemaProvisioner::new(engine.clone(), store.clone(), settings);
    provisioner.register_root(
        SchemaConnection::new("postgres", ROOT_URL, "postgres", "admin", "admin").managed(managed),
    );

    Fixture {
        engine,
        store,
        provisioner,
    }
}

fn blog() -> ModuleDescriptor {
    ModuleDescriptor::new("blog", "1.0.0").with_manifest(
        ModuleManifest::new().with_datasource(
            DatasourceDescriptor::new("postgres", "db/blog").with_extra_migrations("db/blog-extra"),
        ),
    )
}

async fn binding(f: &Fixture) -> Binding {
    f.store.get_binding("acme", "blog").await.unwrap().unwrap()
}

#[tokio::test]
async fn test_module_without_datasource_needs_no_schema() {
    let f = fixture(true).await;
    let module = ModuleDescriptor::new("blog", "1.0.0");

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &module).await;

    assert_eq!(report.state, MigrationState::NoSchemaNeeded);
    assert_eq!(f.engine.init_runs(), 0);
}

#[tokio::test]
async fn test_missing_or_down_root_is_unavailable() {
    let f = fixture(true).await;
    let module = ModuleDescriptor::new("blog", "1.0.0").with_manifest(
        ModuleManifest::new().with_datasource(DatasourceDescriptor::new("mysql", "db")),
    );
    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &module).await;
    assert_eq!(report.state, MigrationState::Unavailable);

    f.provisioner.set_root_active("postgres", false);
    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;
    assert_eq!(report.state, MigrationState::Unavailable);

    f.provisioner.set_root_active("postgres", true);
    f.engine.set_reachable(ROOT_URL, false);
    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;
    assert_eq!(report.state, MigrationState::Unavailable);
    assert!(f.engine.schemas().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_root_times_out_as_unavailable() {
    let f = fixture(true).await;
    f.engine.set_latency(Some(Duration::from_secs(10)));

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(report.state, MigrationState::Unavailable);
}

#[tokio::test]
async fn test_unmanaged_root_only_checks_reachability() {
    let f = fixture(false).await;

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(report.state, MigrationState::Supported);
    assert_eq!(f.engine.init_runs(), 0);
    assert!(f.store.schema_connections().is_empty());
}

#[tokio::test]
async fn test_managed_root_creates_and_migrates() {
    let f = fixture(true).await;

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(report.state, MigrationState::Migrated);
    let identity = f.provisioner.identity_for("acme", "blog");
    assert!(f.engine.has_schema(&identity.database));
    assert!(f.engine.has_role(&identity.user));
    assert_eq!(
        f.engine.applied_migrations(&identity.database),
        vec!["db/blog".to_string(), "db/blog-extra".to_string()]
    );

    let stored = binding(&f).await.schema_connection.unwrap();
    assert!(stored.managed);
    assert_eq!(stored.database, identity.database);
    assert_eq!(stored.password, identity.password);
    assert_eq!(stored.migration_state, MigrationState::Migrated);
}

#[tokio::test]
async fn test_reprovisioning_skips_init_script() {
    let f = fixture(true).await;

    let first = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;
    let second = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(first.state, MigrationState::Migrated);
    assert_eq!(second.state, MigrationState::Migrated);
    assert_eq!(f.engine.init_runs(), 1);
    let (a, b) = (first.connection.unwrap(), second.connection.unwrap());
    assert_eq!(a.database, b.database);
    assert_eq!(a.user, b.user);
    assert_eq!(a.password, b.password);
}

#[tokio::test]
async fn test_migration_failure_after_create_leaves_no_orphans() {
    let f = fixture(true).await;
    f.engine.fail_next(Fault::Migrate);

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(report.state, MigrationState::Error);
    assert!(report.rollback.is_some_and(|r| r.is_clean()));
    let identity = f.provisioner.identity_for("acme", "blog");
    assert!(!f.engine.has_schema(&identity.database));
    assert!(!f.engine.has_role(&identity.user));
    assert!(f.store.schema_connections().is_empty());
}

#[tokio::test]
async fn test_init_failure_is_rolled_back() {
    let f = fixture(true).await;
    f.engine.fail_next(Fault::Init);

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(report.state, MigrationState::Error);
    assert_eq!(f.engine.drop_runs(), 1);
    assert!(f.engine.schemas().is_empty());
    assert!(f.store.schema_connections().is_empty());
}

#[tokio::test]
async fn test_migration_failure_on_existing_schema_keeps_it() {
    let f = fixture(true).await;
    let identity = f.provisioner.identity_for("acme", "blog");
    f.engine.create_schema(&identity.database);
    f.engine.fail_next(Fault::Migrate);

    let report = f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    assert_eq!(report.state, MigrationState::Error);
    assert!(report.rollback.is_none());
    assert!(f.engine.has_schema(&identity.database));
    assert_eq!(f.engine.drop_runs(), 0);
}

#[tokio::test]
async fn test_drop_binding_schema() {
    let f = fixture(true).await;
    f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;

    let dropped = f.provisioner.drop_binding_schema(&binding(&f).await).await.unwrap();

    assert!(dropped);
    assert!(f.engine.schemas().is_empty());
    assert!(f.store.schema_connections().is_empty());
    assert!(!f.provisioner.drop_binding_schema(&binding(&f).await).await.unwrap());
}

#[tokio::test]
async fn test_refresh_reachability_toggles_active() {
    let f = fixture(true).await;
    f.provisioner.provision_and_migrate(&binding(&f).await, &blog()).await;
    let mut b = binding(&f).await;
    let url = b.schema_connection.as_ref().unwrap().url.clone();

    f.engine.set_reachable(&url, false);
    assert!(!f.provisioner.refresh_reachability(&mut b).await.unwrap());
    assert!(!binding(&f).await.schema_connection.unwrap().active);

    f.engine.set_reachable(&url, true);
    assert!(f.provisioner.refresh_reachability(&mut b).await.unwrap());
    assert!(binding(&f).await.schema_connection.unwrap().active);
}

#[tokio::test]
async fn test_similar_tenant_names_get_separate_schemas() {
    let f = fixture(true).await;
    for (tenant, module) in [("a_b", "c"), ("a", "b_c"), ("acme-shop", "x"), ("acme_shop", "x")] {
        f.store.save_tenant(&TenantDefinition::new(tenant)).await.unwrap();
        f.store.save_binding(&Binding::new(tenant, module)).await.unwrap();
    }
    let module = |name: &str| {
        ModuleDescriptor::new(name, "1.0.0").with_manifest(
            ModuleManifest::new().with_datasource(DatasourceDescriptor::new("postgres", "db")),
        )
    };

    for (tenant, name) in [("a_b", "c"), ("a", "b_c"), ("acme-shop", "x"), ("acme_shop", "x")] {
        let b = f.store.get_binding(tenant, name).await.unwrap().unwrap();
        let report = f.provisioner.provision_and_migrate(&b, &module(name)).await;
        assert_eq!(report.state, MigrationState::Migrated);
    }

    assert_eq!(f.engine.init_runs(), 4);
    assert_eq!(f.engine.schemas().len(), 4);

    let victim = f.provisioner.identity_for("a_b", "c");
    let detached = f.store.get_binding("a", "b_c").await.unwrap().unwrap();
    assert!(f.provisioner.drop_binding_schema(&detached).await.unwrap());

    assert!(f.engine.has_schema(&victim.database));
    assert_eq!(f.engine.schemas().len(), 3);
    let kept = f.store.get_binding("a_b", "c").await.unwrap().unwrap();
    assert_eq!(kept.schema_connection.unwrap().password, victim.password);
}

/// Store whose schema-connection writes start failing after `allowed` calls.
struct FailingStore {
    inner: InMemoryTenantStore,
    allowed: usize,
    saves: AtomicUsize,
}

#[async_trait]
impl TenantStore for FailingStore {
    async fn get_tenant(&self, name: &str) -> Result<Option<TenantDefinition>> {
        self.inner.get_tenant(name).await
    }

    async fn list_tenants(&self) -> Result<Vec<TenantDefinition>> {
        self.inner.list_tenants().await
    }

    async fn save_tenant(&self, tenant: &TenantDefinition) -> Result<()> {
        self.inner.save_tenant(tenant).await
    }

    async fn delete_tenant(&self, name: &str) -> Result<()> {
        self.inner.delete_tenant(name).await
    }

    async fn get_module(&self, name: &str) -> Result<Option<ModuleDescriptor>> {
        self.inner.get_module(name).await
    }

    async fn save_module(&self, module: &ModuleDescriptor) -> Result<()> {
        self.inner.save_module(module).await
    }

    async fn bindings(&self, tenant: &str) -> Result<Vec<Binding>> {
        self.inner.bindings(tenant).await
    }

    async fn save_binding(&self, binding: &Binding) -> Result<()> {
        self.inner.save_binding(binding).await
    }

    async fn remove_binding(&self, tenant: &str, module: &str) -> Result<bool> {
        self.inner.remove_binding(tenant, module).await
    }

    async fn save_schema_connection(
        &self,
        tenant: &str,
        module: &str,
        connection: &SchemaConnection,
    ) -> Result<()> {
        if self.saves.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(TenantError::Storage("store offline".into()));
        }
        self.inner.save_schema_connection(tenant, module, connection).await
    }

    async fn delete_schema_connection(&self, tenant: &str, module: &str) -> Result<bool> {
        self.inner.delete_schema_connection(tenant, module).await
    }
}

#[tokio::test]
async fn test_unrecorded_migration_failure_still_reports_error() {
    let engine = Arc::new(InMemorySchemaEngine::new());
    let store = Arc::new(FailingStore {
        inner: InMemoryTenantStore::new(),
        allowed: 1,
        saves: AtomicUsize::new(0),
    });
    store.save_tenant(&TenantDefinition::new("acme")).await.unwrap();
    store.save_binding(&Binding::new("acme", "blog")).await.unwrap();
    let provisioner = SchemaProvisioner::new(engine.clone(), store.clone(), ProvisionerSettings::default());
    provisioner.register_root(
        SchemaConnection::new("postgres", ROOT_URL, "postgres", "admin", "admin").managed(true),
    );
    let identity = provisioner.identity_for("acme", "blog");
    engine.create_schema(&identity.database);
    engine.fail_next(Fault::Migrate);

    let b = store.get_binding("acme", "blog").await.unwrap().unwrap();
    let report = provisioner.provision_and_migrate(&b, &blog()).await;

    assert_eq!(report.state, MigrationState::Error);
    assert_eq!(report.connection.unwrap().migration_state, MigrationState::Error);
    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    assert!(engine.has_schema(&identity.database));
}
