use meshd_core::NodeId;
use tokio::sync::broadcast;

use crate::edge::{Edge, EdgeKey, EdgeRegistry};
use crate::facade::{TopologyChange, TopologyListener};
use crate::node::{Node, NodeRegistry};
use crate::replicator::{Outbound, ReplicatorStats};

/// Capacity of the async topology-change channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The whole known mesh as seen from the local node.
///
/// Owned by a single writer. Mutations go through the replicator methods
/// (`add_edge`, `remove_edge`, `evict_node`, ...) which only touch the
/// registries and raise `dirty`; queries on the routing facade call
/// `recompute()` first when the flag is set, so a burst of mutations costs
/// one recompute.
pub struct Graph {
    self_id: NodeId,
    pub(crate) nodes: NodeRegistry,
    pub(crate) edges: EdgeRegistry,
    pub(crate) dirty: bool,
    pub(crate) generation: u64,
    pub(crate) outbox: Vec<Outbound>,
    pub(crate) stats: ReplicatorStats,
    pub(crate) listeners: Vec<Box<dyn TopologyListener>>,
    pub(crate) events: broadcast::Sender<TopologyChange>,
}

impl Graph {
    /// Create a graph holding only the local node as reachable root.
    pub fn new(self_id: NodeId) -> Self {
        let mut nodes = NodeRegistry::new();
        nodes.insert(Node::root(self_id.clone()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::debug!(node = %self_id, "topology graph initialized");

        Self {
            self_id,
            nodes,
            edges: EdgeRegistry::new(),
            dirty: false,
            generation: 0,
            outbox: Vec::new(),
            stats: ReplicatorStats::default(),
            listeners: Vec::new(),
            events,
        }
    }

    /// The local node's id (the root of every tree this graph computes).
    pub fn self_id(&self) -> &NodeId {
        &self.self_id
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeRegistry {
        &self.edges
    }

    /// Raw node record. Placement fields reflect the last recompute, which
    /// may be stale while `is_dirty()`.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, a: &NodeId, b: &NodeId) -> Option<&Edge> {
        EdgeKey::new(a, b).ok().and_then(|key| self.edges.get(&key))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of recomputes run so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &ReplicatorStats {
        &self.stats
    }

    /// Nodes with a Local edge to us, in ascending id order.
    pub fn neighbors(&self) -> Vec<NodeId> {
        let mut neighbors: Vec<NodeId> = self
            .edges
            .touching(&self.self_id)
            .filter(|e| e.is_local())
            .filter_map(|e| e.key.other(&self.self_id).cloned())
            .collect();
        neighbors.sort();
        neighbors
    }

    pub fn is_neighbor(&self, id: &NodeId) -> bool {
        EdgeKey::new(&self.self_id, id)
            .ok()
            .and_then(|key| self.edges.get(&key))
            .map_or(false, Edge::is_local)
    }

    /// Register a listener called synchronously at the end of every recompute.
    pub fn add_listener(&mut self, listener: Box<dyn TopologyListener>) {
        self.listeners.push(listener);
    }

    /// Subscribe to topology changes from async code.
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyChange> {
        self.events.subscribe()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
