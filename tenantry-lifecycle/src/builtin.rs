//! Daemons every loaded tenant runs.

use crate::daemon::{Daemon, DaemonError};
use crate::orchestrator::Orchestrator;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tenantry_cache::ResponseCache;
use tracing::{debug, info, warn};

pub const RELOAD_WATCHER: &str = "reload-watcher";
pub const CACHE_SWEEPER: &str = "cache-sweeper";

/// Reloads its tenant once a binding is flagged `reload_required` or a
/// reload was requested on the handle.
///
/// The reload runs on its own task: it cancels this daemon as part of the
/// teardown.
pub struct ReloadSignalWatcher {
    orchestrator: Weak<Orchestrator>,
    tenant: String,
    interval: Duration,
    pending: Arc<AtomicBool>,
}

impl ReloadSignalWatcher {
    pub fn new(orchestrator: Weak<Orchestrator>, tenant: impl Into<String>, interval: Duration) -> Self {
        Self {
            orchestrator,
            tenant: tenant.into(),
            interval,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Daemon for ReloadSignalWatcher {
    fn name(&self) -> &str {
        RELOAD_WATCHER
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<(), DaemonError> {
        let Some(orchestrator) = self.orchestrator.upgrade() else {
            return Ok(());
        };
        if self.pending.load(Ordering::Acquire) || !orchestrator.reload_wanted(&self.tenant).await? {
            return Ok(());
        }

        info!(tenant = %self.tenant, "Reload signal received");
        self.pending.store(true, Ordering::Release);
        let tenant = self.tenant.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.load_tenant(&tenant).await {
                warn!(tenant = %tenant, error = %e, "Signalled reload failed");
            }
            pending.store(false, Ordering::Release);
        });
        Ok(())
    }
}

/// Purges expired entries from the tenant's response cache.
pub struct CacheSweeper {
    cache: Arc<ResponseCache>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: Arc<ResponseCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }
}

#[async_trait]
impl Daemon for CacheSweeper {
    fn name(&self) -> &str {
        CACHE_SWEEPER
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<(), DaemonError> {
        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(cache = %self.cache.name(), purged, "Expired cache entries purged");
        }
        Ok(())
    }
}
