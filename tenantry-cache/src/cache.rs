//! TTL + LRU response cache for a single tenant.

use crate::config::{CacheConfig, ExpiryBasis};
use crate::key::matches_prefix;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::time::Instant;
use tracing::debug;

/// Cached response body.
pub type Payload = Arc<[u8]>;

#[derive(Debug, Clone)]
struct Entry {
    payload: Payload,
    inserted_at: Instant,
    accessed_at: Instant,
}

impl Entry {
    fn is_expired(&self, config: &CacheConfig, now: Instant) -> bool {
        let since = match config.expiry {
            ExpiryBasis::Creation => self.inserted_at,
            ExpiryBasis::Access => self.accessed_at,
        };
        now.duration_since(since) >= config.ttl
    }
}

struct Store {
    entries: LruCache<String, Entry>,
    index: Option<BTreeSet<String>>,
}

impl Store {
    fn unindex(&mut self, key: &str) {
        if let Some(index) = self.index.as_mut() {
            index.remove(key);
        }
    }

    fn take(&mut self, key: &str) -> bool {
        let removed = self.entries.pop(key).is_some();
        if removed {
            self.unindex(key);
        }
        removed
    }
}

#[derive(Default)]
struct Counters {
    puts: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    removals: AtomicU64,
    put_nanos: AtomicU64,
    get_nanos: AtomicU64,
    removal_nanos: AtomicU64,
}

/// Snapshot of a cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub size: usize,
    pub puts: u64,
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub removals: u64,
}

/// Per-tenant response cache.
///
/// Entries expire after `ttl` (from insertion or last access) and the least
/// recently used entry is evicted once `max_entries` is reached.
pub struct ResponseCache {
    name: String,
    config: CacheConfig,
    store: Mutex<Store>,
    counters: Counters,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("size", &self.len())
            .finish()
    }
}

impl ResponseCache {
    /// Create new cache.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        let index = config.key_index_enabled.then(BTreeSet::new);
        Self {
            name: name.into(),
            config,
            store: Mutex::new(Store {
                entries: LruCache::new(capacity),
                index,
            }),
            counters: Counters::default(),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a live entry. Expired entries are dropped on the way.
    pub fn get(&self, key: impl ToString) -> Option<Payload> {
        let key = key.to_string();
        let started = std::time::Instant::now();
        let now = Instant::now();

        let found = {
            let mut store = self.store.lock();
            let expired = match store.entries.get_mut(&key) {
                Some(entry) if !entry.is_expired(&self.config, now) => {
                    entry.accessed_at = now;
                    None
                }
                Some(_) => Some(true),
                None => Some(false),
            };
            match expired {
                None => store.entries.peek(&key).map(|e| e.payload.clone()),
                Some(true) => {
                    store.take(&key);
                    None
                }
                Some(false) => None,
            }
        };

        if self.config.statistics_enabled {
            self.counters.gets.fetch_add(1, Ordering::Relaxed);
            let counter = if found.is_some() {
                &self.counters.hits
            } else {
                &self.counters.misses
            };
            counter.fetch_add(1, Ordering::Relaxed);
            self.counters
                .get_nanos
                .fetch_add(elapsed_nanos(started), Ordering::Relaxed);
        }
        found
    }

    /// Store a payload, evicting the least recently used entry when full.
    pub fn put(&self, key: impl ToString, payload: impl Into<Payload>) {
        if self.is_destroyed() {
            debug!(cache = %self.name, "Ignoring put on destroyed cache");
            return;
        }
        let key = key.to_string();
        let started = std::time::Instant::now();
        let now = Instant::now();
        let entry = Entry {
            payload: payload.into(),
            inserted_at: now,
            accessed_at: now,
        };

        {
            let mut store = self.store.lock();
            if let Some((evicted, _)) = store.entries.push(key.clone(), entry)
                && evicted != key
            {
                store.unindex(&evicted);
            }
            if let Some(index) = store.index.as_mut() {
                index.insert(key);
            }
        }

        if self.config.statistics_enabled {
            self.counters.puts.fetch_add(1, Ordering::Relaxed);
            self.counters
                .put_nanos
                .fetch_add(elapsed_nanos(started), Ordering::Relaxed);
        }
    }

    /// Remove a single entry.
    pub fn remove(&self, key: impl ToString) -> bool {
        let key = key.to_string();
        let started = std::time::Instant::now();
        let removed = self.store.lock().take(&key);
        if removed && self.config.statistics_enabled {
            self.counters.removals.fetch_add(1, Ordering::Relaxed);
            self.counters
                .removal_nanos
                .fetch_add(elapsed_nanos(started), Ordering::Relaxed);
        }
        removed
    }

    /// Remove a batch of entries, returning how many existed.
    pub fn remove_many(&self, keys: &[String]) -> usize {
        keys.iter().filter(|key| self.remove(key.as_str())).count()
    }

    /// Keys under `prefix`, per the configured matching mode.
    pub fn matching_keys(&self, prefix: &str) -> Vec<String> {
        let mode = self.config.prefix_match;
        let store = self.store.lock();
        match store.index.as_ref() {
            Some(index) => index
                .range(prefix.to_string()..)
                .take_while(|key| key.starts_with(prefix))
                .filter(|key| matches_prefix(key, prefix, mode))
                .cloned()
                .collect(),
            None => store
                .entries
                .iter()
                .map(|(key, _)| key)
                .filter(|key| matches_prefix(key, prefix, mode))
                .cloned()
                .collect(),
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut store = self.store.lock();
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(&self.config, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            store.take(key);
        }
        if !expired.is_empty() {
            debug!(cache = %self.name, purged = expired.len(), "Purged expired entries");
        }
        expired.len()
    }

    pub fn clear(&self) {
        let mut store = self.store.lock();
        store.entries.clear();
        if let Some(index) = store.index.as_mut() {
            index.clear();
        }
    }

    /// Empty the cache and refuse further writes.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.clear();
    }

    pub fn stats(&self) -> CacheStatistics {
        CacheStatistics {
            size: self.len(),
            puts: self.counters.puts.load(Ordering::Relaxed),
            gets: self.counters.gets.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            removals: self.counters.removals.load(Ordering::Relaxed),
        }
    }

    /// Flat statistics map for reporting.
    pub fn statistics(&self) -> BTreeMap<String, String> {
        let stats = self.stats();
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        let mut map = BTreeMap::new();
        map.insert("name".to_string(), self.name.clone());
        map.insert("size".to_string(), stats.size.to_string());
        map.insert("puts".to_string(), stats.puts.to_string());
        map.insert("gets".to_string(), stats.gets.to_string());
        map.insert("removals".to_string(), stats.removals.to_string());
        map.insert("hits".to_string(), stats.hits.to_string());
        map.insert(
            "hitsPercent".to_string(),
            format!("{:.2}", percent(stats.hits, stats.gets)),
        );
        map.insert("misses".to_string(), stats.misses.to_string());
        map.insert(
            "missesPercent".to_string(),
            format!("{:.2}", percent(stats.misses, stats.gets)),
        );
        map.insert(
            "avgPutTimeMs".to_string(),
            format!("{:.4}", average_ms(load(&self.counters.put_nanos), stats.puts)),
        );
        map.insert(
            "avgGetTimeMs".to_string(),
            format!("{:.4}", average_ms(load(&self.counters.get_nanos), stats.gets)),
        );
        map.insert(
            "avgRemovalTimeMs".to_string(),
            format!(
                "{:.4}",
                average_ms(load(&self.counters.removal_nanos), stats.removals)
            ),
        );
        map
    }
}

fn elapsed_nanos(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn average_ms(total_nanos: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_nanos as f64 / count as f64 / 1_000_000.0
    }
}
