//! Persisted tenant configuration.

use crate::{Binding, ModuleDescriptor, Result, SchemaConnection, TenantDefinition, TenantError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Tenant configuration store
///
/// Implement this over whatever persists tenant definitions, the module
/// catalog and bindings. Bindings keep their insertion order per tenant.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Get tenant definition by name
    async fn get_tenant(&self, name: &str) -> Result<Option<TenantDefinition>>;

    /// List every tenant definition
    async fn list_tenants(&self) -> Result<Vec<TenantDefinition>>;

    /// Create or replace a tenant definition
    async fn save_tenant(&self, tenant: &TenantDefinition) -> Result<()>;

    /// Delete a tenant definition and all of its bindings
    async fn delete_tenant(&self, name: &str) -> Result<()>;

    /// Get a module from the catalog
    async fn get_module(&self, name: &str) -> Result<Option<ModuleDescriptor>>;

    /// Create or replace a catalog module
    async fn save_module(&self, module: &ModuleDescriptor) -> Result<()>;

    /// Bindings of a tenant, in attach order
    async fn bindings(&self, tenant: &str) -> Result<Vec<Binding>>;

    /// Create or replace a binding
    async fn save_binding(&self, binding: &Binding) -> Result<()>;

    /// Remove a binding; returns whether it existed
    async fn remove_binding(&self, tenant: &str, module: &str) -> Result<bool>;

    /// Attach a schema connection to an existing binding
    async fn save_schema_connection(
        &self,
        tenant: &str,
        module: &str,
        connection: &SchemaConnection,
    ) -> Result<()>;

    /// Detach a binding's schema connection; returns whether one existed
    async fn delete_schema_connection(&self, tenant: &str, module: &str) -> Result<bool>;

    /// Get one binding
    async fn get_binding(&self, tenant: &str, module: &str) -> Result<Option<Binding>> {
        Ok(self
            .bindings(tenant)
            .await?
            .into_iter()
            .find(|b| b.module == module))
    }

    /// Flag a binding for reload by the tenant's reload watcher
    async fn mark_reload_required(&self, tenant: &str, module: &str, required: bool) -> Result<()> {
        let mut binding = self
            .get_binding(tenant, module)
            .await?
            .ok_or_else(|| TenantError::ModuleNotFound(format!("{}/{}", tenant, module)))?;
        binding.reload_required = required;
        self.save_binding(&binding).await
    }
}

/// In-memory tenant store for testing
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<String, TenantDefinition>>,
    modules: RwLock<HashMap<String, ModuleDescriptor>>,
    bindings: RwLock<HashMap<String, Vec<Binding>>>,
}

impl InMemoryTenantStore {
    /// Create new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Every binding-owned schema connection, as `(tenant, module, connection)`.
    pub fn schema_connections(&self) -> Vec<(String, String, SchemaConnection)> {
        self.bindings
            .read()
            .values()
            .flatten()
            .filter_map(|b| {
                b.schema_connection
                    .clone()
                    .map(|c| (b.tenant.clone(), b.module.clone(), c))
            })
            .collect()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get_tenant(&self, name: &str) -> Result<Option<TenantDefinition>> {
        Ok(self.tenants.read().get(name).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantDefinition>> {
        let mut tenants: Vec<_> = self.tenants.read().values().cloned().collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn save_tenant(&self, tenant: &TenantDefinition) -> Result<()> {
        if tenant.name.trim().is_empty() {
            return Err(TenantError::Invalid("tenant name is empty".to_string()));
        }
        self.tenants
            .write()
            .insert(tenant.name.clone(), tenant.clone());
        Ok(())
    }

    async fn delete_tenant(&self, name: &str) -> Result<()> {
        self.tenants.write().remove(name);
        self.bindings.write().remove(name);
        Ok(())
    }

    async fn get_module(&self, name: &str) -> Result<Option<ModuleDescriptor>> {
        Ok(self.modules.read().get(name).cloned())
    }

    async fn save_module(&self, module: &ModuleDescriptor) -> Result<()> {
        self.modules
            .write()
            .insert(module.name.clone(), module.clone());
        Ok(())
    }

    async fn bindings(&self, tenant: &str) -> Result<Vec<Binding>> {
        Ok(self.bindings.read().get(tenant).cloned().unwrap_or_default())
    }

    async fn save_binding(&self, binding: &Binding) -> Result<()> {
        if !self.tenants.read().contains_key(&binding.tenant) {
            return Err(TenantError::NotFound(binding.tenant.clone()));
        }

        let mut bindings = self.bindings.write();
        let list = bindings.entry(binding.tenant.clone()).or_default();
        match list.iter_mut().find(|b| b.module == binding.module) {
            Some(existing) => *existing = binding.clone(),
            None => list.push(binding.clone()),
        }
        Ok(())
    }

    async fn remove_binding(&self, tenant: &str, module: &str) -> Result<bool> {
        let mut bindings = self.bindings.write();
        let Some(list) = bindings.get_mut(tenant) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|b| b.module != module);
        Ok(list.len() != before)
    }

    async fn save_schema_connection(
        &self,
        tenant: &str,
        module: &str,
        connection: &SchemaConnection,
    ) -> Result<()> {
        let mut bindings = self.bindings.write();
        let binding = bindings
            .get_mut(tenant)
            .and_then(|list| list.iter_mut().find(|b| b.module == module))
            .ok_or_else(|| TenantError::ModuleNotFound(format!("{}/{}", tenant, module)))?;
        binding.schema_connection = Some(connection.clone());
        Ok(())
    }

    async fn delete_schema_connection(&self, tenant: &str, module: &str) -> Result<bool> {
        let mut bindings = self.bindings.write();
        Ok(bindings
            .get_mut(tenant)
            .and_then(|list| list.iter_mut().find(|b| b.module == module))
            .and_then(|b| b.schema_connection.take())
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> InMemoryTenantStore {
        let store = InMemoryTenantStore::new();
        store.save_tenant(&TenantDefinition::new("acme")).await.unwrap();
        store.save_binding(&Binding::new("acme", "blog")).await.unwrap();
        store.save_binding(&Binding::new("acme", "shop")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_bindings_keep_order_on_update() {
        let store = seeded().await;

        let mut blog = store.get_binding("acme", "blog").await.unwrap().unwrap();
        blog.active = false;
        store.save_binding(&blog).await.unwrap();

        let modules: Vec<_> = store
            .bindings("acme")
            .await
            .unwrap()
            .into_iter()
            .map(|b| (b.module, b.active))
            .collect();
        assert_eq!(
            modules,
            vec![("blog".to_string(), false), ("shop".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_binding_requires_tenant() {
        let store = InMemoryTenantStore::new();
        let err = store.save_binding(&Binding::new("ghost", "blog")).await;
        assert!(matches!(err, Err(TenantError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_schema_connection_roundtrip() {
        let store = seeded().await;
        let conn = SchemaConnection::new("postgres", "pg://db", "acme_blog", "acme_blog", "pw");

        store.save_schema_connection("acme", "blog", &conn).await.unwrap();
        assert_eq!(store.schema_connections().len(), 1);

        assert!(store.delete_schema_connection("acme", "blog").await.unwrap());
        assert!(!store.delete_schema_connection("acme", "blog").await.unwrap());
        assert!(store.schema_connections().is_empty());
    }

    #[tokio::test]
    async fn test_mark_reload_required() {
        let store = seeded().await;
        store.mark_reload_required("acme", "shop", true).await.unwrap();

        let shop = store.get_binding("acme", "shop").await.unwrap().unwrap();
        assert!(shop.reload_required);
        assert!(store.mark_reload_required("acme", "nope", true).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_tenant_drops_bindings() {
        let store = seeded().await;
        store.delete_tenant("acme").await.unwrap();

        assert!(store.get_tenant("acme").await.unwrap().is_none());
        assert!(store.bindings("acme").await.unwrap().is_empty());
    }
}
