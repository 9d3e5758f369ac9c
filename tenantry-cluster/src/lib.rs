//! Cluster coordination for tenantry nodes.
//!
//! Each node runs a [`ClusterCoordinator`] that heartbeats over a pluggable
//! [`MessageBus`], tracks peer liveness in a [`ClusterState`] map and
//! propagates tenant lifecycle events so peers can drop their local state.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenantry_cluster::{ClusterCoordinator, ClusterEventType, InMemoryBus};
//!
//! let coordinator = Arc::new(ClusterCoordinator::new(settings, Arc::new(InMemoryBus::default())));
//! coordinator.start().await;
//! coordinator.broadcast_lifecycle_event("acme", ClusterEventType::TenantUnloaded).await;
//! ```

pub mod bus;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod event;
pub mod state;

pub use bus::{EventStream, InMemoryBus, MessageBus};
pub use coordinator::{ClusterCoordinator, ClusterEventHandler, Disposition};
pub use dedup::DedupWindow;
pub use error::{ClusterError, Result};
pub use event::{ClusterEvent, ClusterEventType, DedupKey};
pub use state::{ClusterNodeState, ClusterState, MembershipChange};
