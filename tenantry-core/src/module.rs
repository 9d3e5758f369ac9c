//! Module descriptors and resource manifests.
//!
//! A module is a shared catalog entry: one descriptor may be bound to many
//! tenants. The orchestrator reads manifests but never interprets artifact
//! contents.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of artifact a module contributes to a tenant environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Jar,
    Resource,
    Dictionary,
    MigrationScript,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jar => write!(f, "jar"),
            Self::Resource => write!(f, "resource"),
            Self::Dictionary => write!(f, "dictionary"),
            Self::MigrationScript => write!(f, "migration-script"),
        }
    }
}

/// Where an artifact's content lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// One entry of a resource manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub name: String,
    pub source: ArtifactSource,
    pub version: Option<String>,
}

impl Artifact {
    /// Create an in-memory artifact
    pub fn bytes(kind: ArtifactKind, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            name: name.into(),
            source: ArtifactSource::Bytes(bytes.into()),
            version: None,
        }
    }

    /// Create a file-backed artifact
    pub fn path(kind: ArtifactKind, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            name: name.into(),
            source: ArtifactSource::Path(path.into()),
            version: None,
        }
    }

    /// Set artifact version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Identity used for environment deduplication: the bare file name.
    pub fn identity(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.name.as_str())
    }
}

/// Relational storage a module needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceDescriptor {
    pub engine_type: String,
    pub migration_location: String,
    #[serde(default)]
    pub extra_migration_location: Option<String>,
    /// A provisioning failure of a mandatory datasource aborts the tenant
    #[serde(default)]
    pub mandatory: bool,
}

impl DatasourceDescriptor {
    pub fn new(engine_type: impl Into<String>, migration_location: impl Into<String>) -> Self {
        Self {
            engine_type: engine_type.into(),
            migration_location: migration_location.into(),
            extra_migration_location: None,
            mandatory: false,
        }
    }

    pub fn with_extra_migrations(mut self, location: impl Into<String>) -> Self {
        self.extra_migration_location = Some(location.into());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Migration locations in the order they are applied.
    pub fn migration_locations(&self) -> Vec<&str> {
        std::iter::once(self.migration_location.as_str())
            .chain(self.extra_migration_location.as_deref())
            .collect()
    }
}

/// Declared resources of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub datasource: Option<DatasourceDescriptor>,
    /// Artifact identities this module expects to resolve from the
    /// assembled environment
    #[serde(default)]
    pub requires: Vec<String>,
}

impl ModuleManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_datasource(mut self, datasource: DatasourceDescriptor) -> Self {
        self.datasource = Some(datasource);
        self
    }

    pub fn requires(mut self, identity: impl Into<String>) -> Self {
        self.requires.push(identity.into());
        self
    }
}

/// Catalog entry for a pluggable module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
    /// Schema-backed modules get a provisioned schema per binding
    pub schema_backed: bool,
    pub permissions: Vec<String>,
    /// Key of the hook implementation in the plugin registry
    pub hooks: Option<String>,
    /// `None` when the manifest could not be read
    pub manifest: Option<ModuleManifest>,
}

impl ModuleDescriptor {
    /// Create a file-based module with an empty manifest
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            schema_backed: false,
            permissions: Vec::new(),
            hooks: None,
            manifest: Some(ModuleManifest::default()),
        }
    }

    pub fn with_manifest(mut self, manifest: ModuleManifest) -> Self {
        self.schema_backed = manifest.datasource.is_some();
        self.manifest = Some(manifest);
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.manifest = None;
        self
    }

    pub fn with_hooks(mut self, key: impl Into<String>) -> Self {
        self.hooks = Some(key.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Datasource declared by the manifest, if any.
    pub fn datasource(&self) -> Option<&DatasourceDescriptor> {
        self.manifest.as_ref().and_then(|m| m.datasource.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_identity_is_file_name() {
        let a = Artifact::path(ArtifactKind::Jar, "lib/commons.jar", "/opt/lib/commons.jar");
        assert_eq!(a.identity(), "commons.jar");

        let b = Artifact::bytes(ArtifactKind::Resource, "messages.properties", b"k=v".to_vec());
        assert_eq!(b.identity(), "messages.properties");
    }

    #[test]
    fn test_manifest_wire_shape() {
        let json = r#"{
            "artifacts": [
                {"type": "migration-script", "name": "V1__init.sql", "source": {"bytes": [1]}, "version": "1"}
            ],
            "datasource": {"engineType": "postgres", "migrationLocation": "db/migration"}
        }"#;

        let manifest: ModuleManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.artifacts[0].kind, ArtifactKind::MigrationScript);
        let ds = manifest.datasource.unwrap();
        assert_eq!(ds.engine_type, "postgres");
        assert!(!ds.mandatory);
        assert!(manifest.requires.is_empty());
    }

    #[test]
    fn test_migration_locations_order() {
        let ds = DatasourceDescriptor::new("postgres", "db/blog").with_extra_migrations("db/extra");
        assert_eq!(ds.migration_locations(), vec!["db/blog", "db/extra"]);
    }

    #[test]
    fn test_with_manifest_marks_schema_backed() {
        let module = ModuleDescriptor::new("blog", "1.0.0").with_manifest(
            ModuleManifest::new().with_datasource(DatasourceDescriptor::new("postgres", "db")),
        );
        assert!(module.schema_backed);
        assert!(module.datasource().is_some());
    }
}
