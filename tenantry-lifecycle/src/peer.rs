//! Reaction to lifecycle events from peer nodes.

use async_trait::async_trait;
use std::sync::Arc;
use tenantry_cache::CacheManager;
use tenantry_cluster::{ClusterEvent, ClusterEventHandler, ClusterEventType};
use tracing::debug;

/// Drops local cache entries of tenants a peer unloaded or deleted, so this
/// node does not serve responses built from the old module set.
pub struct PeerEventHandler {
    caches: Arc<CacheManager>,
}

impl PeerEventHandler {
    pub fn new(caches: Arc<CacheManager>) -> Self {
        Self { caches }
    }
}

#[async_trait]
impl ClusterEventHandler for PeerEventHandler {
    async fn handle(&self, event: &ClusterEvent) -> tenantry_cluster::Result<()> {
        let Some(tenant) = event.tenant_id.as_deref() else {
            return Ok(());
        };
        if matches!(
            event.event_type,
            ClusterEventType::TenantUnloaded | ClusterEventType::TenantDeleted
        ) {
            let cleared = self.caches.clear(tenant);
            debug!(
                tenant = %tenant,
                node = %event.source_node_id,
                event = %event.event_type,
                cleared,
                "Peer lifecycle event applied"
            );
        }
        Ok(())
    }
}
