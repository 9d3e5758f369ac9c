//! Cache configuration.

use std::time::Duration;
use tenantry_config::CacheSettings;

pub use tenantry_config::ExpiryBasis;

/// How prefix eviction compares keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixMatch {
    /// Plain `starts_with`
    Raw,
    /// `starts_with`, and the match must end at `/`, `|` or the end of the key
    #[default]
    Boundary,
}

/// Shape of one tenant cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub expiry: ExpiryBasis,
    pub statistics_enabled: bool,
    /// Keep a sorted key index so prefix eviction avoids full scans
    pub key_index_enabled: bool,
    pub prefix_match: PrefixMatch,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds),
            max_entries: settings.max_entries.max(1),
            expiry: settings.expiry_basis,
            statistics_enabled: settings.statistics_enabled,
            key_index_enabled: settings.key_index_enabled,
            prefix_match: if settings.boundary_prefix_match {
                PrefixMatch::Boundary
            } else {
                PrefixMatch::Raw
            },
        }
    }
}

impl CacheConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryBasis) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    pub fn with_key_index(mut self, enabled: bool) -> Self {
        self.key_index_enabled = enabled;
        self
    }

    pub fn with_prefix_match(mut self, mode: PrefixMatch) -> Self {
        self.prefix_match = mode;
        self
    }

    /// Whether switching from `self` to `other` needs a new cache.
    ///
    /// Only ttl, capacity, expiry basis and the statistics flag count.
    pub fn differs_from(&self, other: &CacheConfig) -> bool {
        self.ttl != other.ttl
            || self.max_entries != other.max_entries
            || self.expiry != other.expiry
            || self.statistics_enabled != other.statistics_enabled
    }
}
