//! Layered loading tests for tenantry-config

use std::fs;
use tenantry_config::*;

fn no_env() -> EnvLoader {
    EnvLoader::from_vars("TENANTRY", Vec::<(String, String)>::new())
}

#[test]
fn test_defaults_without_layers() {
    let config = TenantryConfig::builder().env(no_env()).load().unwrap();

    assert_eq!(config.lifecycle.drain_floor, 1);
    assert_eq!(config.cache.expiry_basis, ExpiryBasis::Creation);
    assert!(config.cache.boundary_prefix_match);
}

#[test]
fn test_toml_file_then_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tenantry.toml");
    fs::write(
        &path,
        r#"
        [node]
        node_id = "node-a"

        [cache]
        ttl_seconds = 60
        max_entries = 3
        expiry_basis = "access"

        [schema]
        schema_prefix = "t"
        "#,
    )
    .unwrap();

    let env = EnvLoader::from_vars("TENANTRY", [("TENANTRY_CACHE_TTL_SECONDS", "5")]);
    let config = TenantryConfig::builder()
        .file(&path)
        .env(env)
        .load()
        .unwrap();

    assert_eq!(config.node.node_id, "node-a");
    assert_eq!(config.cache.ttl_seconds, 5);
    assert_eq!(config.cache.max_entries, 3);
    assert_eq!(config.cache.expiry_basis, ExpiryBasis::Access);
    assert_eq!(config.schema.schema_prefix.as_deref(), Some("t"));
    // untouched sections keep defaults
    assert_eq!(config.lifecycle.drain_poll_interval_ms, 100);
}

#[test]
fn test_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tenantry.json");
    fs::write(
        &path,
        r#"{"lifecycle": {"drain_max_wait_ms": 250, "startup_concurrency": 2}}"#,
    )
    .unwrap();

    let config = TenantryConfig::builder()
        .file(&path)
        .env(no_env())
        .load()
        .unwrap();

    assert_eq!(config.lifecycle.drain_max_wait_ms, 250);
    assert_eq!(config.lifecycle.startup_concurrency, Some(2));
}

#[test]
fn test_invalid_values_rejected() {
    let env = EnvLoader::from_vars("TENANTRY", [("TENANTRY_CACHE_MAX_ENTRIES", "0")]);
    let err = TenantryConfig::builder().env(env).load().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_unsupported_extension() {
    let err = TenantryConfig::builder()
        .file("tenantry.yaml")
        .env(no_env())
        .load()
        .unwrap_err();

    assert!(matches!(err, ConfigError::LoadError(_)));
}
