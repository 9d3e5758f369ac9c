//! Registry of named tenant caches.
//!
//! Prefix eviction is queued onto a single background worker so a caller
//! never scans a cache on its own task. The worker is spawned the first
//! time it is needed and removes matched keys in parallel chunks.

use crate::cache::ResponseCache;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Keys removed per eviction task.
const EVICTION_CHUNK: usize = 256;

struct EvictionJob {
    cache: Arc<ResponseCache>,
    prefix: String,
    reply: oneshot::Sender<usize>,
}

/// Completion of a queued prefix eviction. Resolves to the number of keys removed.
#[must_use = "eviction runs regardless, but its result is only visible by awaiting"]
pub struct EvictionHandle {
    rx: oneshot::Receiver<usize>,
}

impl Future for EvictionHandle {
    type Output = CacheResult<usize>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| CacheError::WorkerGone))
    }
}

/// Named caches, one per tenant.
#[derive(Default)]
pub struct CacheManager {
    caches: DashMap<String, Arc<ResponseCache>>,
    worker: Mutex<Option<mpsc::UnboundedSender<EvictionJob>>>,
}

impl CacheManager {
    /// Create new manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the named cache, creating it if needed.
    ///
    /// An existing cache whose configuration differs is destroyed and replaced.
    pub fn get_or_create(&self, name: &str, config: CacheConfig) -> Arc<ResponseCache> {
        match self.caches.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().config().differs_from(&config) {
                    return occupied.get().clone();
                }
                info!(cache = %name, "Cache configuration changed, recreating");
                let fresh = Arc::new(ResponseCache::new(name, config));
                let old = occupied.insert(fresh.clone());
                old.destroy();
                fresh
            }
            Entry::Vacant(vacant) => {
                debug!(cache = %name, "Creating cache");
                vacant
                    .insert(Arc::new(ResponseCache::new(name, config)))
                    .clone()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResponseCache>> {
        self.caches.get(name).map(|cache| cache.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Remove one key from the named cache.
    pub fn remove(&self, name: &str, key: impl ToString) -> bool {
        self.get(name).is_some_and(|cache| cache.remove(key))
    }

    /// Queue removal of every key under `prefix` in the named cache.
    ///
    /// Fails with [`CacheError::NoRuntime`] outside a Tokio runtime. An
    /// unknown cache resolves immediately to zero.
    pub fn evict_by_prefix(&self, name: &str, prefix: &str) -> CacheResult<EvictionHandle> {
        let (reply, rx) = oneshot::channel();
        let Some(cache) = self.get(name) else {
            let _ = reply.send(0);
            return Ok(EvictionHandle { rx });
        };

        let mut job = EvictionJob {
            cache,
            prefix: prefix.to_string(),
            reply,
        };
        let mut worker = self.worker.lock();
        if let Some(tx) = worker.as_ref() {
            match tx.send(job) {
                Ok(()) => return Ok(EvictionHandle { rx }),
                Err(mpsc::error::SendError(returned)) => {
                    warn!("Eviction worker stopped, restarting");
                    job = returned;
                }
            }
        }

        let tx = spawn_worker()?;
        tx.send(job).map_err(|_| CacheError::WorkerGone)?;
        *worker = Some(tx);
        Ok(EvictionHandle { rx })
    }

    /// Clear the named cache, keeping it registered.
    pub fn clear(&self, name: &str) -> bool {
        match self.get(name) {
            Some(cache) => {
                cache.clear();
                true
            }
            None => false,
        }
    }

    /// Destroy and unregister the named cache.
    pub fn destroy(&self, name: &str) -> bool {
        match self.caches.remove(name) {
            Some((_, cache)) => {
                cache.destroy();
                info!(cache = %name, "Cache destroyed");
                true
            }
            None => false,
        }
    }

    /// Purge expired entries from every cache.
    pub fn purge_expired(&self) -> usize {
        self.caches
            .iter()
            .map(|cache| cache.value().purge_expired())
            .sum()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn statistics(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.get(name).map(|cache| cache.statistics())
    }
}

fn spawn_worker() -> CacheResult<mpsc::UnboundedSender<EvictionJob>> {
    let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<EvictionJob>();
    handle.spawn(async move {
        while let Some(job) = rx.recv().await {
            let removed = evict(&job.cache, &job.prefix).await;
            let _ = job.reply.send(removed);
        }
        debug!("Eviction worker exiting");
    });
    Ok(tx)
}

async fn evict(cache: &Arc<ResponseCache>, prefix: &str) -> usize {
    if cache.is_destroyed() {
        return 0;
    }
    let keys = cache.matching_keys(prefix);
    if keys.is_empty() {
        return 0;
    }

    let tasks = keys.chunks(EVICTION_CHUNK).map(|chunk| {
        let cache = cache.clone();
        let chunk = chunk.to_vec();
        tokio::spawn(async move { cache.remove_many(&chunk) })
    });
    let removed: usize = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(cache = %cache.name(), error = %e, "Eviction chunk failed");
                None
            }
        })
        .sum();

    debug!(cache = %cache.name(), prefix, removed, "Prefix eviction finished");
    removed
}
