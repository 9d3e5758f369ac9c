//! Cache keys and prefix matching.

use crate::config::PrefixMatch;
use std::fmt;

/// Key of a cached response: path, method and variant.
///
/// Renders as `path|METHOD|variant` so path prefixes are key prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: String,
    pub method: String,
    /// Anything else the response varies on (locale, device class, ...)
    pub variant: String,
}

impl CacheKey {
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_uppercase(),
            variant: String::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn render(&self) -> String {
        format!("{}|{}|{}", self.path, self.method, self.variant)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.path, self.method, self.variant)
    }
}

impl From<&CacheKey> for String {
    fn from(key: &CacheKey) -> Self {
        key.render()
    }
}

/// Whether `key` falls under `prefix`.
pub fn matches_prefix(key: &str, prefix: &str, mode: PrefixMatch) -> bool {
    if !key.starts_with(prefix) {
        return false;
    }
    match mode {
        PrefixMatch::Raw => true,
        PrefixMatch::Boundary => {
            prefix.is_empty()
                || prefix.ends_with(['/', '|'])
                || key.len() == prefix.len()
                || matches!(key.as_bytes()[prefix.len()], b'/' | b'|')
        }
    }
}
