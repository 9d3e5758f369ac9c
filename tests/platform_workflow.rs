//! End-to-end workflows across the tenantry crates.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tenantry::cache::{CacheKey, PrefixMatch};
use tenantry::cluster::InMemoryBus;
use tenantry::config::EnvLoader;
use tenantry::prelude::*;
use tenantry::schema::InMemorySchemaEngine;
use tenantry::{DatasourceDescriptor, MigrationState};

const SETTINGS: &str = r#"
[node]
node_id = "node-a"
heartbeat_interval_ms = 1000

[lifecycle]
drain_max_wait_ms = 200
drain_poll_interval_ms = 10
startup_concurrency = 2

[cache]
ttl_seconds = 60
max_entries = 128
key_index_enabled = true

[schema]
schema_prefix = "t"
probe_timeout_ms = 500
"#;

fn load_config() -> TenantryConfig {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(SETTINGS.as_bytes()).unwrap();

    TenantryConfig::builder()
        .file(file.path())
        .env(EnvLoader::from_vars("TENANTRY", std::iter::empty::<(&str, &str)>()))
        .load()
        .unwrap()
}

struct Platform {
    orchestrator: Arc<Orchestrator>,
    store: Arc<InMemoryTenantStore>,
    engine: Arc<InMemorySchemaEngine>,
}

async fn platform(config: TenantryConfig, bus: InMemoryBus) -> Platform {
    let store = Arc::new(InMemoryTenantStore::new());
    let engine = Arc::new(InMemorySchemaEngine::new());
    let plugins = Arc::new(PluginRegistry::new());
    plugins.register("noop", tenantry::loader::NoopHooks);

    let orders = ModuleDescriptor::new("orders", "2.1.0")
        .with_hooks("noop")
        .with_manifest(
            ModuleManifest::new().with_datasource(DatasourceDescriptor::new("postgres", "db/orders")),
        );
    store.save_module(&orders).await.unwrap();
    store
        .save_module(&ModuleDescriptor::new("catalog", "1.0.0").with_manifest(ModuleManifest::new()))
        .await
        .unwrap();

    for tenant in ["acme", "globex"] {
        store
            .save_tenant(&TenantDefinition::new(tenant).with_property("region", "eu"))
            .await
            .unwrap();
        store.save_binding(&Binding::new(tenant, "orders")).await.unwrap();
        store.save_binding(&Binding::new(tenant, "catalog")).await.unwrap();
    }

    let orchestrator = Orchestrator::builder()
        .config(config)
        .store(store.clone())
        .schema_engine(engine.clone())
        .plugins(plugins)
        .message_bus(Arc::new(bus))
        .root_connection(
            SchemaConnection::new("postgres", "pg://root", "postgres", "admin", "admin")
                .managed(true),
        )
        .build();

    Platform {
        orchestrator,
        store,
        engine,
    }
}

#[tokio::test]
async fn test_configured_platform_lifecycle() {
    let config = load_config();
    assert_eq!(config.node.node_id, "node-a");
    assert_eq!(config.lifecycle.startup_concurrency, Some(2));

    let p = platform(config, InMemoryBus::default()).await;
    let results = p.orchestrator.start_all().await.unwrap();
    assert_eq!(results.len(), 2);

    for (tenant, result) in &results {
        let report = result.as_ref().unwrap();
        assert_eq!(report.active_modules, vec!["orders", "catalog"], "{tenant}");
        assert_eq!(report.migration_states["orders"], MigrationState::Migrated);
    }
    // one schema per tenant, named after the configured prefix
    let schemas = p.engine.schemas();
    assert_eq!(schemas.len(), 2);
    assert!(schemas.iter().all(|s| s.starts_with("t_")));

    let binding = p.store.get_binding("acme", "orders").await.unwrap().unwrap();
    assert!(binding.schema_connection.as_ref().unwrap().managed);

    // response caching under request guards
    {
        let _request = p.orchestrator.begin_request("acme").unwrap();
        let cache = p.orchestrator.cache("acme").unwrap();
        assert_eq!(cache.config().prefix_match, PrefixMatch::Boundary);
        cache.put(CacheKey::get("/orders/1"), b"one".to_vec());
        cache.put(CacheKey::get("/orders/10"), b"ten".to_vec());
        cache.put(CacheKey::get("/orders-archive"), b"archive".to_vec());
        assert_eq!(p.orchestrator.tenant("acme").unwrap().in_flight(), 1);
    }

    let evicted = p
        .orchestrator
        .caches()
        .evict_by_prefix("acme", "/orders")
        .unwrap()
        .await
        .unwrap();
    assert_eq!(evicted, 2);
    let stats = p.orchestrator.caches().statistics("acme").unwrap();
    assert_eq!(stats["size"], "1");

    p.orchestrator.delete_tenant("acme").await.unwrap();
    assert_eq!(p.engine.schemas().len(), 1);
    assert_eq!(p.orchestrator.tenants(), vec!["globex"]);

    p.orchestrator.shutdown_all(Duration::from_secs(2)).await;
    assert_eq!(p.orchestrator.state("globex"), TenantState::Stopped);
}

#[tokio::test]
async fn test_peer_delete_reaches_other_node() {
    let bus = InMemoryBus::new(128);
    let mut config_a = load_config();
    config_a.node.node_id = "node-a".to_string();
    let mut config_b = load_config();
    config_b.node.node_id = "node-b".to_string();

    let a = platform(config_a, bus.clone()).await;
    let b = platform(config_b, bus.clone()).await;
    a.orchestrator.start_all().await.unwrap();
    b.orchestrator.start_all().await.unwrap();

    let peers = b.orchestrator.cluster().state();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !peers.is_alive("node-a") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("node-a never seen by node-b");

    let cache = b.orchestrator.cache("globex").unwrap();
    cache.put(CacheKey::get("/catalog"), b"items".to_vec());

    a.orchestrator.delete_tenant("globex").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !cache.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer delete never cleared node-b's cache");
    // the peer keeps serving its own copy of the tenant
    assert_eq!(b.orchestrator.state("globex"), TenantState::Started);

    a.orchestrator.shutdown_all(Duration::from_secs(1)).await;
    b.orchestrator.shutdown_all(Duration::from_secs(1)).await;
}
