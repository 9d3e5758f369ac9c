//! Cluster membership map.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Liveness record for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNodeState {
    pub node_id: String,
    pub last_heartbeat: DateTime<Utc>,
    pub alive: bool,
}

/// Membership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Joined,
    Left,
}

/// Shared view of known nodes.
#[derive(Debug, Default)]
pub struct ClusterState {
    nodes: DashMap<String, ClusterNodeState>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a join or leave. Repeated delivery is harmless.
    pub fn on_membership_change(&self, change: MembershipChange, node_id: &str) {
        match change {
            MembershipChange::Joined => {
                let previous = self.nodes.insert(
                    node_id.to_string(),
                    ClusterNodeState {
                        node_id: node_id.to_string(),
                        last_heartbeat: Utc::now(),
                        alive: true,
                    },
                );
                match previous {
                    Some(_) => debug!(node = %node_id, "Node re-joined"),
                    None => info!(node = %node_id, "Node joined cluster"),
                }
            }
            MembershipChange::Left => match self.nodes.remove(node_id) {
                Some(_) => info!(node = %node_id, "Node left cluster"),
                None => warn!(node = %node_id, "Leave for unknown node ignored"),
            },
        }
    }

    /// Record a heartbeat, registering the node if it is new.
    pub fn record_heartbeat(&self, node_id: &str) {
        let now = Utc::now();
        self.nodes
            .entry(node_id.to_string())
            .and_modify(|node| {
                if !node.alive {
                    info!(node = %node_id, "Node is alive again");
                }
                node.last_heartbeat = now;
                node.alive = true;
            })
            .or_insert_with(|| {
                info!(node = %node_id, "Node discovered by heartbeat");
                ClusterNodeState {
                    node_id: node_id.to_string(),
                    last_heartbeat: now,
                    alive: true,
                }
            });
    }

    /// Mark nodes silent for longer than `timeout` as dead.
    pub fn sweep(&self, timeout: Duration) -> Vec<String> {
        self.sweep_at(Utc::now(), timeout)
    }

    /// Sweep against an explicit clock reading.
    pub fn sweep_at(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut dead = Vec::new();
        for mut node in self.nodes.iter_mut() {
            if node.alive && now.signed_duration_since(node.last_heartbeat) > timeout {
                node.alive = false;
                warn!(node = %node.node_id, "Node missed heartbeats, marking dead");
                dead.push(node.node_id.clone());
            }
        }
        dead
    }

    pub fn get(&self, node_id: &str) -> Option<ClusterNodeState> {
        self.nodes.get(node_id).map(|node| node.clone())
    }

    pub fn is_alive(&self, node_id: &str) -> bool {
        self.nodes.get(node_id).is_some_and(|node| node.alive)
    }

    pub fn alive_nodes(&self) -> Vec<String> {
        let mut alive: Vec<String> = self
            .nodes
            .iter()
            .filter(|node| node.alive)
            .map(|node| node.node_id.clone())
            .collect();
        alive.sort();
        alive
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_leave_are_idempotent() {
        let state = ClusterState::new();
        state.on_membership_change(MembershipChange::Joined, "n1");
        state.on_membership_change(MembershipChange::Joined, "n1");
        assert_eq!(state.len(), 1);

        state.on_membership_change(MembershipChange::Left, "n1");
        state.on_membership_change(MembershipChange::Left, "n1");
        assert!(state.is_empty());
    }

    #[test]
    fn test_heartbeat_registers_and_revives() {
        let state = ClusterState::new();
        state.record_heartbeat("n1");
        assert!(state.is_alive("n1"));

        let later = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(state.sweep_at(later, Duration::from_secs(10)), vec!["n1"]);
        assert!(!state.is_alive("n1"));

        state.record_heartbeat("n1");
        assert!(state.is_alive("n1"));
    }

    #[test]
    fn test_sweep_spares_recent_nodes() {
        let state = ClusterState::new();
        state.record_heartbeat("n1");
        state.record_heartbeat("n2");

        assert!(state.sweep(Duration::from_secs(60)).is_empty());
        assert_eq!(state.alive_nodes(), vec!["n1", "n2"]);
    }
}
