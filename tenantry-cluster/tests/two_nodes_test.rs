//! Two coordinators sharing one in-memory bus.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tenantry_cluster::{
    ClusterCoordinator, ClusterEvent, ClusterEventHandler, ClusterEventType, InMemoryBus,
    MessageBus, Result,
};
use tenantry_config::NodeSettings;

#[derive(Default)]
struct Recorder(Mutex<Vec<(ClusterEventType, Option<String>)>>);

#[async_trait]
impl ClusterEventHandler for Recorder {
    async fn handle(&self, event: &ClusterEvent) -> Result<()> {
        self.0.lock().push((event.event_type, event.tenant_id.clone()));
        Ok(())
    }
}

fn node(id: &str) -> NodeSettings {
    NodeSettings {
        node_id: id.to_string(),
        heartbeat_interval_ms: 50,
        dead_node_timeout_ms: 200,
        dedup_window: 16,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn peers_see_each_other_and_tenant_events() {
    let bus = InMemoryBus::new(64);
    let a = Arc::new(ClusterCoordinator::new(node("a"), Arc::new(bus.clone())));
    let b = Arc::new(ClusterCoordinator::new(node("b"), Arc::new(bus.clone())));
    let recorder = Arc::new(Recorder::default());
    b.add_handler(recorder.clone());

    a.start().await;
    b.start().await;

    let b_state = b.state();
    wait_until(|| b_state.is_alive("a")).await;

    assert!(a.broadcast_lifecycle_event("acme", ClusterEventType::TenantUnloaded).await);
    wait_until(|| !recorder.0.lock().is_empty()).await;
    assert_eq!(
        recorder.0.lock().as_slice(),
        &[(ClusterEventType::TenantUnloaded, Some("acme".to_string()))]
    );

    a.shutdown(Duration::from_secs(1)).await;
    wait_until(|| b_state.get("a").is_none()).await;
    b.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn redelivered_event_handled_once() {
    let bus = InMemoryBus::new(64);
    let b = Arc::new(ClusterCoordinator::new(node("b"), Arc::new(bus.clone())));
    let recorder = Arc::new(Recorder::default());
    b.add_handler(recorder.clone());
    b.start_listener();

    let event = ClusterEvent::tenant(ClusterEventType::TenantDeleted, "a", "acme");
    bus.publish(&event).await.unwrap();
    bus.publish(&event).await.unwrap();
    bus.publish(&event.clone().with_timestamp(event.timestamp + 1))
        .await
        .unwrap();

    wait_until(|| recorder.0.lock().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.0.lock().len(), 2);

    b.shutdown(Duration::from_secs(1)).await;
}
