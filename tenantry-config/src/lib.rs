//! Configuration for tenantry nodes.
//!
//! Settings are layered: built-in defaults, then an optional JSON/TOML file,
//! then an optional `.env` file, then `TENANTRY_<SECTION>_<KEY>` process
//! variables. The merged document is validated before it is returned.
//!
//! ```rust,ignore
//! use tenantry_config::TenantryConfig;
//!
//! let config = TenantryConfig::builder()
//!     .file("tenantry.toml")
//!     .dotenv(".env")
//!     .load()?;
//! println!("node {}", config.node.node_id);
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{
    CacheSettings, ExpiryBasis, LifecycleSettings, NodeSettings, SCRIPT_PLACEHOLDERS,
    SchemaSettings, TenantryConfig,
};
pub use validation::{ConfigValidator, Validate};

use std::path::PathBuf;

impl TenantryConfig {
    /// Start a layered load.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Defaults plus process environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::builder().load()
    }
}

/// Layered configuration loader.
#[derive(Default)]
pub struct ConfigBuilder {
    file: Option<PathBuf>,
    dotenv: Option<PathBuf>,
    env: Option<EnvLoader>,
}

impl ConfigBuilder {
    /// Settings file; format is detected from the extension.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// `.env` file read before the process environment.
    pub fn dotenv(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv = Some(path.into());
        self
    }

    /// Replace the process environment (mostly for tests).
    pub fn env(mut self, env: EnvLoader) -> Self {
        self.env = Some(env);
        self
    }

    /// Merge every layer, deserialize and validate.
    pub fn load(self) -> Result<TenantryConfig> {
        let mut document = serde_json::to_value(TenantryConfig::default())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        let mut env = self.env.unwrap_or_default();

        if let Some(path) = &self.file {
            let loader = ConfigLoader::auto(path)?;
            if loader.format() == FileFormat::Env {
                env = env.with_dotenv(path)?;
            } else {
                loader::merge(&mut document, loader.load_file(path)?);
            }
        }

        if let Some(path) = &self.dotenv {
            env = env.with_dotenv(path)?;
        }

        loader::merge(&mut document, env.overrides());

        let config: TenantryConfig = serde_json::from_value(document)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
