//! Pluggable message bus.

use crate::error::{ClusterError, Result};
use crate::event::ClusterEvent;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

/// Stream of events received from the bus.
pub type EventStream = Pin<Box<dyn Stream<Item = ClusterEvent> + Send>>;

/// Transport carrying cluster events between nodes.
///
/// Delivery is fire-and-forget and may repeat; consumers deduplicate.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish an event to every subscribed node.
    async fn publish(&self, event: &ClusterEvent) -> Result<()>;

    /// Subscribe to events published from now on.
    fn subscribe(&self) -> EventStream;
}

/// Process-local bus built on a Tokio broadcast channel.
///
/// Clones share the channel, so one bus can connect several coordinators in
/// a test. Events are encoded to their wire form on publish.
#[derive(Clone)]
pub struct InMemoryBus {
    tx: broadcast::Sender<Vec<u8>>,
    failures: Arc<AtomicUsize>,
    published: Arc<AtomicU64>,
}

impl InMemoryBus {
    /// Create new bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            failures: Arc::new(AtomicUsize::new(0)),
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make the next `count` publishes fail.
    pub fn fail_next_publishes(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of events successfully published.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish raw bytes, bypassing encoding.
    pub fn publish_raw(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(bytes);
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, event: &ClusterEvent) -> Result<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ClusterError::Publish("injected failure".to_string()));
        }

        let bytes = event.to_bytes()?;
        // No subscribers is not an error for a fire-and-forget bus.
        let _ = self.tx.send(bytes);
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(bytes) => match ClusterEvent::from_bytes(&bytes) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable cluster event");
                        None
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cluster event subscriber lagged");
                    None
                }
            }
        });
        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ClusterEventType;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = InMemoryBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.clone().subscribe();

        let event = ClusterEvent::tenant(ClusterEventType::TenantLoaded, "n1", "acme");
        bus.publish(&event).await.unwrap();

        assert_eq!(a.next().await, Some(event.clone()));
        assert_eq!(b.next().await, Some(event));
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = InMemoryBus::new(16);
        bus.publish(&ClusterEvent::heartbeat("n1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let bus = InMemoryBus::new(16);
        bus.fail_next_publishes(2);

        tokio_test::assert_err!(bus.publish(&ClusterEvent::heartbeat("n1")).await);
        tokio_test::assert_err!(bus.publish(&ClusterEvent::heartbeat("n1")).await);
        tokio_test::assert_ok!(bus.publish(&ClusterEvent::heartbeat("n1")).await);
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn test_garbage_is_skipped() {
        let bus = InMemoryBus::new(16);
        let mut sub = bus.subscribe();

        bus.publish_raw(b"not json".to_vec());
        let event = ClusterEvent::heartbeat("n1");
        bus.publish(&event).await.unwrap();

        assert_eq!(sub.next().await, Some(event));
    }
}
