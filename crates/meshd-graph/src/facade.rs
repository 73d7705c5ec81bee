use chrono::{DateTime, Duration, Utc};
use meshd_core::{NodeId, Subnet};
use serde::{Deserialize, Serialize};

use crate::edge::EdgeKey;
use crate::graph::Graph;
use crate::node::NodeStatus;

/// Emitted once at the end of every recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyChange {
    pub generation: u64,
    pub became_reachable: Vec<NodeId>,
    pub became_unreachable: Vec<NodeId>,
    /// Reachable nodes after the recompute, self included.
    pub reachable: usize,
}

/// Synchronous observer of topology changes.
///
/// Listeners run inside the graph's single mutation domain and only see an
/// immutable change record.
pub trait TopologyListener: Send {
    fn on_topology_changed(&mut self, change: &TopologyChange);
}

impl<F> TopologyListener for F
where
    F: FnMut(&TopologyChange) + Send,
{
    fn on_topology_changed(&mut self, change: &TopologyChange) {
        self(change)
    }
}

/// Computed placement of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRoute {
    pub id: NodeId,
    pub status: NodeStatus,
    pub distance: Option<u64>,
    pub via: Option<NodeId>,
    pub mst_edge: Option<EdgeKey>,
    pub subnets: Vec<Subnet>,
}

/// Serializable view of the routing state, sorted by node id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSnapshot {
    pub self_id: NodeId,
    pub generation: u64,
    pub nodes: Vec<NodeRoute>,
    pub broadcast_edges: Vec<(NodeId, NodeId)>,
}

// Every query recomputes first when the graph is dirty, so results always
// reflect all mutations applied so far.
impl Graph {
    /// The neighbor to hand traffic for `id` to, or `None` if unreachable.
    pub fn next_hop(&mut self, id: &NodeId) -> Option<NodeId> {
        self.refresh();
        self.nodes.get(id).and_then(|n| n.via()).cloned()
    }

    pub fn is_reachable(&mut self, id: &NodeId) -> bool {
        self.refresh();
        self.nodes.get(id).map_or(false, |n| n.is_reachable())
    }

    /// Tree edges as `(parent, child)` pairs, sorted.
    pub fn broadcast_edges(&mut self) -> Vec<(NodeId, NodeId)> {
        self.refresh();
        self.tree_edges()
    }

    /// Neighbors a broadcast frame is flooded to: every direct neighbor whose
    /// tunnel is a tree edge, minus the one the frame arrived from.
    pub fn broadcast_targets(&mut self, arrived_from: Option<&NodeId>) -> Vec<NodeId> {
        self.refresh();
        let self_id = self.self_id().clone();
        self.neighbors()
            .into_iter()
            .filter(|n| Some(n) != arrived_from)
            .filter(|n| {
                let tunnel = EdgeKey::new(&self_id, n).ok();
                self.nodes
                    .get(n)
                    .and_then(|node| node.mst_edge())
                    .map_or(false, |edge| Some(edge) == tunnel.as_ref())
            })
            .collect()
    }

    /// The reachable node claiming `subnet`. Lowest id wins on duplicate claims.
    pub fn route_subnet(&mut self, subnet: &Subnet) -> Option<NodeId> {
        self.refresh();
        self.nodes
            .iter()
            .filter(|n| n.is_reachable() && n.subnets().contains(subnet))
            .map(|n| n.id())
            .min()
            .cloned()
    }

    pub fn snapshot(&mut self) -> RoutingSnapshot {
        self.refresh();
        let nodes = self
            .nodes
            .ids()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .map(|node| NodeRoute {
                id: node.id().clone(),
                status: node.status(),
                distance: node.distance(),
                via: node.via().cloned(),
                mst_edge: node.mst_edge().cloned(),
                subnets: node.subnets().iter().cloned().collect(),
            })
            .collect();

        RoutingSnapshot {
            self_id: self.self_id().clone(),
            generation: self.generation(),
            nodes,
            broadcast_edges: self.tree_edges(),
        }
    }

    /// Nodes that have been unreachable for longer than `timeout` at `now`.
    pub fn unreachable_longer_than(&mut self, timeout: Duration, now: DateTime<Utc>) -> Vec<NodeId> {
        self.refresh();
        let mut stale: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.status() == NodeStatus::Unreachable)
            .filter(|n| now - n.status_changed_at() > timeout)
            .map(|n| n.id().clone())
            .collect();
        stale.sort();
        stale
    }

    fn tree_edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<(NodeId, NodeId)> = self
            .nodes
            .iter()
            .filter_map(|node| {
                let key = node.mst_edge()?;
                let parent = key.other(node.id())?;
                Some((parent.clone(), node.id().clone()))
            })
            .collect();
        pairs.sort();
        pairs
    }
}
