//! Cluster event wire shape.
//!
//! Events travel as JSON objects:
//!
//! ```json
//! {"eventType":"TENANT_UNLOADED","sourceNodeID":"node-1","tenantID":"acme","timestamp":1700000000000}
//! ```

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of cluster event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterEventType {
    Heartbeat,
    MemberJoined,
    MemberLeft,
    TenantLoaded,
    TenantUnloaded,
    TenantDeleted,
}

impl ClusterEventType {
    /// Whether the event concerns a tenant rather than a node.
    pub fn is_tenant_event(&self) -> bool {
        matches!(
            self,
            Self::TenantLoaded | Self::TenantUnloaded | Self::TenantDeleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "HEARTBEAT",
            Self::MemberJoined => "MEMBER_JOINED",
            Self::MemberLeft => "MEMBER_LEFT",
            Self::TenantLoaded => "TENANT_LOADED",
            Self::TenantUnloaded => "TENANT_UNLOADED",
            Self::TenantDeleted => "TENANT_DELETED",
        }
    }
}

impl fmt::Display for ClusterEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event exchanged between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEvent {
    #[serde(rename = "eventType")]
    pub event_type: ClusterEventType,
    #[serde(rename = "sourceNodeID")]
    pub source_node_id: String,
    #[serde(rename = "tenantID", default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Identity used to recognise a redelivered event.
pub type DedupKey = (ClusterEventType, Option<String>, i64);

impl ClusterEvent {
    /// Create new event stamped with the current time.
    pub fn new(event_type: ClusterEventType, source_node_id: impl Into<String>) -> Self {
        Self {
            event_type,
            source_node_id: source_node_id.into(),
            tenant_id: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn heartbeat(node_id: impl Into<String>) -> Self {
        Self::new(ClusterEventType::Heartbeat, node_id)
    }

    pub fn tenant(
        event_type: ClusterEventType,
        node_id: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self::new(event_type, node_id).with_tenant(tenant)
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn dedup_key(&self) -> DedupKey {
        (self.event_type, self.tenant_id.clone(), self.timestamp)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
