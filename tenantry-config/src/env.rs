// Environment variable overrides

use crate::{ConfigError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/// Default prefix for tenantry variables.
pub const DEFAULT_PREFIX: &str = "TENANTRY";

/// Environment variable loader.
///
/// Variables named `<PREFIX>_<SECTION>_<KEY>` become overrides for
/// `section.key`, so `TENANTRY_CACHE_TTL_SECONDS=60` sets
/// `cache.ttl_seconds`.
pub struct EnvLoader {
    prefix: String,
    vars: BTreeMap<String, String>,
}

impl EnvLoader {
    /// Capture the process environment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, env::vars())
    }

    /// Use an explicit set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add the entries of a `.env` file. Process variables win over file
    /// entries with the same name.
    pub fn with_dotenv(mut self, path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::ParseError(e.to_string()))?;
            self.vars.entry(key).or_insert(value);
        }

        Ok(self)
    }

    /// Look up a single `<PREFIX>_<KEY>` variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(&format!("{}_{}", self.prefix, key.to_uppercase()))
            .map(String::as_str)
    }

    /// Build the nested override document.
    pub fn overrides(&self) -> Value {
        let mut root = serde_json::Map::new();
        let prefix = format!("{}_", self.prefix);

        for (key, value) in &self.vars {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some((section, field)) = rest.split_once('_') else {
                continue;
            };
            if section.is_empty() || field.is_empty() {
                continue;
            }

            let section = root
                .entry(section.to_lowercase())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(section) = section {
                section.insert(field.to_lowercase(), coerce(value));
            }
        }

        Value::Object(root)
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(b) = trimmed.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(n) = trimmed.parse::<u64>() {
        return Value::from(n);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    Value::String(raw.to_string())
}
