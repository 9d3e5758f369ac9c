//! Cluster coordinator.
//!
//! Owns the node's heartbeat, listener and dead-node sweep daemons. Tenant
//! events from peers are deduplicated and handed to registered
//! [`ClusterEventHandler`]s; send failures are logged and never surface to
//! callers.

use crate::bus::MessageBus;
use crate::dedup::DedupWindow;
use crate::error::Result;
use crate::event::{ClusterEvent, ClusterEventType};
use crate::state::{ClusterState, MembershipChange};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tenantry_config::NodeSettings;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reacts to tenant events published by other nodes.
///
/// Events are deduplicated before dispatch, but handlers should still
/// tolerate seeing the same tenant change twice.
#[async_trait]
pub trait ClusterEventHandler: Send + Sync {
    async fn handle(&self, event: &ClusterEvent) -> Result<()>;
}

/// What happened to an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Published by this node
    OwnEvent,
    /// Applied to the membership map
    Membership,
    /// Already seen within the dedup window
    Duplicate,
    /// Handed to handlers
    Dispatched,
}

/// Heartbeats, membership and event propagation for one node.
pub struct ClusterCoordinator {
    node_id: String,
    settings: NodeSettings,
    bus: Arc<dyn MessageBus>,
    state: Arc<ClusterState>,
    handlers: RwLock<Vec<Arc<dyn ClusterEventHandler>>>,
    dedup: Mutex<DedupWindow>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClusterCoordinator {
    /// Create new coordinator for the node described by `settings`.
    pub fn new(settings: NodeSettings, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            node_id: settings.node_id.clone(),
            dedup: Mutex::new(DedupWindow::new(settings.dedup_window)),
            settings,
            bus,
            state: Arc::new(ClusterState::new()),
            handlers: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> Arc<ClusterState> {
        self.state.clone()
    }

    pub fn add_handler(&self, handler: Arc<dyn ClusterEventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Start every daemon and announce this node.
    pub async fn start(self: &Arc<Self>) {
        self.state.record_heartbeat(&self.node_id);
        self.start_listener();
        self.start_heartbeat(self.settings.heartbeat_interval());
        self.start_sweeper(self.settings.dead_node_timeout());
        self.announce_join().await;
    }

    /// Periodically publish a liveness event for this node.
    pub fn start_heartbeat(self: &Arc<Self>, interval: Duration) {
        let this = self.clone();
        self.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                this.state.record_heartbeat(&this.node_id);
                let event = ClusterEvent::heartbeat(&this.node_id);
                if let Err(e) = this.bus.publish(&event).await {
                    warn!(node = %this.node_id, error = %e, "Heartbeat send failed, retrying next interval");
                }
            }
            debug!(node = %this.node_id, "Heartbeat stopped");
        });
    }

    /// Consume the bus until shutdown.
    pub fn start_listener(self: &Arc<Self>) {
        let this = self.clone();
        let mut events = self.bus.subscribe();
        self.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    next = events.next() => match next {
                        Some(event) => event,
                        None => {
                            warn!(node = %this.node_id, "Message bus closed, listener stopping");
                            break;
                        }
                    },
                };
                this.process(event).await;
            }
            debug!(node = %this.node_id, "Listener stopped");
        });
    }

    /// Periodically mark silent nodes as dead.
    pub fn start_sweeper(self: &Arc<Self>, timeout: Duration) {
        let this = self.clone();
        let period = self.settings.heartbeat_interval();
        self.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                this.state.sweep(timeout);
            }
        });
    }

    /// Apply one incoming event.
    pub async fn process(&self, event: ClusterEvent) -> Disposition {
        if event.source_node_id == self.node_id {
            return Disposition::OwnEvent;
        }

        match event.event_type {
            ClusterEventType::Heartbeat => {
                self.state.record_heartbeat(&event.source_node_id);
                return Disposition::Membership;
            }
            ClusterEventType::MemberJoined => {
                self.state
                    .on_membership_change(MembershipChange::Joined, &event.source_node_id);
                return Disposition::Membership;
            }
            ClusterEventType::MemberLeft => {
                self.state
                    .on_membership_change(MembershipChange::Left, &event.source_node_id);
                return Disposition::Membership;
            }
            _ => {}
        }

        if !self.dedup.lock().insert(event.dedup_key()) {
            debug!(event = %event.event_type, tenant = ?event.tenant_id, "Duplicate event skipped");
            return Disposition::Duplicate;
        }

        let handlers = self.handlers.read().clone();
        for handler in handlers {
            if let Err(e) = handler.handle(&event).await {
                warn!(
                    event = %event.event_type,
                    tenant = ?event.tenant_id,
                    error = %e,
                    "Cluster event handler failed"
                );
            }
        }
        Disposition::Dispatched
    }

    /// Tell peers about a tenant lifecycle change. Never fails.
    pub async fn broadcast_lifecycle_event(&self, tenant: &str, event_type: ClusterEventType) -> bool {
        let event = ClusterEvent::tenant(event_type, &self.node_id, tenant);
        match self.bus.publish(&event).await {
            Ok(()) => {
                debug!(tenant = %tenant, event = %event_type, "Lifecycle event broadcast");
                true
            }
            Err(e) => {
                warn!(tenant = %tenant, event = %event_type, error = %e, "Lifecycle broadcast failed");
                false
            }
        }
    }

    pub async fn announce_join(&self) -> bool {
        self.announce(ClusterEventType::MemberJoined).await
    }

    pub async fn announce_leave(&self) -> bool {
        self.announce(ClusterEventType::MemberLeft).await
    }

    async fn announce(&self, event_type: ClusterEventType) -> bool {
        let event = ClusterEvent::new(event_type, &self.node_id);
        match self.bus.publish(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(node = %self.node_id, event = %event_type, error = %e, "Announcement failed");
                false
            }
        }
    }

    /// Stop the daemons, waiting at most `timeout`, then announce departure.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let joined = tokio::time::timeout(timeout, futures::future::join_all(tasks)).await;
        if joined.is_err() {
            warn!(node = %self.node_id, ?timeout, "Cluster daemons did not stop in time");
        }

        self.announce_leave().await;
        info!(node = %self.node_id, "Cluster coordinator stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.tasks.lock().push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl ClusterEventHandler for Counting {
        async fn handle(&self, _event: &ClusterEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings(node: &str) -> NodeSettings {
        NodeSettings {
            node_id: node.to_string(),
            ..NodeSettings::default()
        }
    }

    #[tokio::test]
    async fn test_own_events_ignored() {
        let coordinator = ClusterCoordinator::new(settings("n1"), Arc::new(InMemoryBus::default()));
        let event = ClusterEvent::tenant(ClusterEventType::TenantUnloaded, "n1", "acme");

        assert_eq!(coordinator.process(event).await, Disposition::OwnEvent);
    }

    #[tokio::test]
    async fn test_redelivery_dispatched_once() {
        let coordinator = ClusterCoordinator::new(settings("n1"), Arc::new(InMemoryBus::default()));
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        coordinator.add_handler(counter.clone());

        let event = ClusterEvent::tenant(ClusterEventType::TenantDeleted, "n2", "acme");
        assert_eq!(coordinator.process(event.clone()).await, Disposition::Dispatched);
        assert_eq!(coordinator.process(event).await, Disposition::Duplicate);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_membership_events_update_state() {
        let coordinator = ClusterCoordinator::new(settings("n1"), Arc::new(InMemoryBus::default()));

        coordinator
            .process(ClusterEvent::new(ClusterEventType::MemberJoined, "n2"))
            .await;
        assert!(coordinator.state().is_alive("n2"));

        coordinator
            .process(ClusterEvent::new(ClusterEventType::MemberLeft, "n2"))
            .await;
        // repeated leave only warns
        coordinator
            .process(ClusterEvent::new(ClusterEventType::MemberLeft, "n2"))
            .await;
        assert!(coordinator.state().get("n2").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_failure_is_not_fatal() {
        let bus = InMemoryBus::default();
        bus.fail_next_publishes(1);
        let coordinator = ClusterCoordinator::new(settings("n1"), Arc::new(bus.clone()));

        assert!(!coordinator.broadcast_lifecycle_event("acme", ClusterEventType::TenantUnloaded).await);
        assert!(coordinator.broadcast_lifecycle_event("acme", ClusterEventType::TenantUnloaded).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_survives_send_failures() {
        let bus = InMemoryBus::default();
        bus.fail_next_publishes(2);
        let coordinator = Arc::new(ClusterCoordinator::new(settings("n1"), Arc::new(bus.clone())));

        coordinator.start_heartbeat(Duration::from_millis(100));
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert!(bus.published() >= 2);
        coordinator.shutdown(Duration::from_secs(1)).await;
        assert!(!coordinator.is_running());
    }
}
