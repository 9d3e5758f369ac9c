//! Per-tenant execution environment.
//!
//! Artifacts from every bound module merged into one namespace keyed by
//! artifact identity. Once assembled the environment never changes; a
//! reload assembles a new one.

use std::collections::BTreeMap;
use tenantry_core::{Artifact, ArtifactKind};

/// An artifact and the module that contributed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub artifact: Artifact,
    pub owner: String,
}

/// Immutable merged namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    tenant: String,
    shared: BTreeMap<String, Entry>,
    migrations: BTreeMap<String, Entry>,
}

impl Environment {
    /// An environment with nothing in it.
    pub fn empty(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            ..Default::default()
        }
    }

    pub(crate) fn from_parts(
        tenant: String,
        shared: BTreeMap<String, Entry>,
        migrations: BTreeMap<String, Entry>,
    ) -> Self {
        Self {
            tenant,
            shared,
            migrations,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Resolve a jar, resource or dictionary by identity.
    pub fn resolve(&self, identity: &str) -> Option<&Artifact> {
        self.shared.get(identity).map(|e| &e.artifact)
    }

    /// Module that owns `identity`.
    pub fn origin_of(&self, identity: &str) -> Option<&str> {
        self.shared.get(identity).map(|e| e.owner.as_str())
    }

    /// Whether `identity` resolves, either as a shared artifact or as one
    /// of the namespaced migration scripts.
    pub fn provides(&self, identity: &str) -> bool {
        self.shared.contains_key(identity) || self.migrations.contains_key(identity)
    }

    /// Migration scripts contributed by `module`, ordered by name.
    pub fn migration_scripts<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.migrations
            .values()
            .filter(move |e| e.owner == module)
            .map(|e| &e.artifact)
    }

    /// Shared artifacts of one kind.
    pub fn artifacts_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.shared
            .values()
            .map(|e| &e.artifact)
            .filter(move |a| a.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.shared.len() + self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
