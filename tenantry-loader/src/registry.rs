//! Plugin registry
//!
//! Hook implementations are registered under a reference key; module
//! descriptors name the key. Lookups happen once per assembly, when the
//! loader builds the tenant's dispatch table.

use crate::hooks::{ModuleHooks, NoopHooks};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of hook implementations keyed by reference.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, Arc<dyn ModuleHooks>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register hooks under `key`, replacing any previous registration.
    pub fn register<H>(&self, key: impl Into<String>, hooks: H)
    where
        H: ModuleHooks + 'static,
    {
        self.plugins.insert(key.into(), Arc::new(hooks));
    }

    /// Register an already shared implementation.
    pub fn register_arc(&self, key: impl Into<String>, hooks: Arc<dyn ModuleHooks>) {
        self.plugins.insert(key.into(), hooks);
    }

    pub fn unregister(&self, key: &str) -> bool {
        self.plugins.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.plugins.contains_key(key)
    }

    pub fn resolve(&self, key: &str) -> Option<Arc<dyn ModuleHooks>> {
        self.plugins.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        f.debug_struct("PluginRegistry").field("keys", &keys).finish()
    }
}

/// Module name to hook implementation, fixed for one assembly.
#[derive(Clone, Default)]
pub struct DispatchTable {
    entries: HashMap<String, Arc<dyn ModuleHooks>>,
}

impl DispatchTable {
    pub(crate) fn insert(&mut self, module: String, hooks: Arc<dyn ModuleHooks>) {
        self.entries.insert(module, hooks);
    }

    /// Hooks for `module`; modules without hooks get [`NoopHooks`].
    pub fn get(&self, module: &str) -> Arc<dyn ModuleHooks> {
        self.entries
            .get(module)
            .cloned()
            .unwrap_or_else(|| Arc::new(NoopHooks))
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("modules", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
