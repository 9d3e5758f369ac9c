//! Per-tenant background daemons.
//!
//! A daemon is a periodic task owned by one loaded tenant. Every daemon of a
//! tenant hangs off one [`DaemonRegistry`], so unloading the tenant cancels
//! them all through a single token. Loops yield before each iteration and
//! delay missed ticks instead of bursting, which keeps them behind
//! request-serving tasks on a busy runtime.

use crate::handle::TenantHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error type daemon iterations may return.
pub type DaemonError = Box<dyn std::error::Error + Send + Sync>;

/// A periodic background task.
#[async_trait]
pub trait Daemon: Send + Sync {
    fn name(&self) -> &str;

    /// Delay between iterations.
    fn interval(&self) -> Duration;

    /// One iteration. Errors are logged and the loop continues.
    async fn tick(&self) -> Result<(), DaemonError>;
}

/// Creates collaborator daemons (indexers, repository watchers) for a
/// freshly loaded tenant.
pub trait DaemonFactory: Send + Sync {
    fn create(&self, tenant: &Arc<TenantHandle>) -> Vec<Arc<dyn Daemon>>;
}

/// Running daemons of one tenant.
pub struct DaemonRegistry {
    tenant: String,
    token: CancellationToken,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl DaemonRegistry {
    /// Create new registry cancelled together with `parent`.
    pub fn new(tenant: impl Into<String>, parent: &CancellationToken) -> Self {
        Self {
            tenant: tenant.into(),
            token: parent.child_token(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn spawn(&self, daemon: Arc<dyn Daemon>) {
        let name = daemon.name().to_string();
        let token = self.token.clone();
        let tenant = self.tenant.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(daemon.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately; daemons start one interval in
            ticker.tick().await;

            loop {
                tokio::task::yield_now().await;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if token.is_cancelled() {
                    break;
                }
                if let Err(e) = daemon.tick().await {
                    warn!(tenant = %tenant, daemon = %daemon.name(), error = %e, "Daemon iteration failed");
                }
            }
            debug!(tenant = %tenant, daemon = %daemon.name(), "Daemon stopped");
        });

        self.tasks.lock().push((name, task));
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal every daemon and wait up to `timeout` for them to stop.
    /// Stragglers are aborted; their count is returned.
    pub async fn cancel_all(&self, timeout: Duration) -> usize {
        self.token.cancel();
        let tasks: Vec<(String, JoinHandle<()>)> = std::mem::take(&mut *self.tasks.lock());

        let mut stragglers = 0;
        let deadline = tokio::time::Instant::now() + timeout;
        for (name, mut task) in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                warn!(tenant = %self.tenant, daemon = %name, "Daemon did not stop in time, aborting");
                task.abort();
                stragglers += 1;
            }
        }
        stragglers
    }
}

impl Drop for DaemonRegistry {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
