//! Per-tenant response caching.
//!
//! Each tenant gets a named [`ResponseCache`] bounded by a time-to-live and
//! an LRU capacity. The [`CacheManager`] owns the caches, recreates them when
//! their configuration changes and runs prefix eviction on a background
//! worker.
//!
//! ```rust,ignore
//! use tenantry_cache::{CacheConfig, CacheKey, CacheManager};
//!
//! let manager = CacheManager::new();
//! let cache = manager.get_or_create("acme", CacheConfig::new());
//! cache.put(CacheKey::get("/orders/7"), body);
//!
//! let removed = manager.evict_by_prefix("acme", "/orders")?.await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod manager;

pub use cache::{CacheStatistics, Payload, ResponseCache};
pub use config::{CacheConfig, ExpiryBasis, PrefixMatch};
pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, matches_prefix};
pub use manager::{CacheManager, EvictionHandle};
