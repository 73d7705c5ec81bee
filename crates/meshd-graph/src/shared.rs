use std::cell::Cell;
use std::sync::{Arc, Mutex, PoisonError};

use meshd_core::{NodeId, Subnet};
use tokio::sync::broadcast;

use crate::edge::EdgeOrigin;
use crate::error::GraphError;
use crate::facade::{RoutingSnapshot, TopologyChange, TopologyListener};
use crate::graph::Graph;
use crate::replicator::{EdgeAnnouncement, Outbound};

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running topology listeners.
pub(crate) struct DispatchGuard {
    previous: bool,
}

impl DispatchGuard {
    pub(crate) fn enter() -> Self {
        let previous = DISPATCHING.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(self.previous));
    }
}

fn dispatching() -> bool {
    DISPATCHING.with(Cell::get)
}

/// Cloneable handle to a [`Graph`] shared between tasks.
///
/// Every call, mutation or query, runs under one lock, so a query never
/// observes a half-applied update and the recompute it triggers is part of
/// the same critical section. Calls made from inside a listener on the
/// dispatching thread fail with [`GraphError::Reentrant`].
#[derive(Clone)]
pub struct SharedGraph {
    inner: Arc<Mutex<Graph>>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    /// Run `f` with exclusive access to the graph.
    pub fn with<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> Result<R, GraphError> {
        if dispatching() {
            return Err(GraphError::Reentrant);
        }
        // A panicking listener must not take routing down with it.
        let mut graph = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut graph))
    }

    pub fn self_id(&self) -> Result<NodeId, GraphError> {
        self.with(|g| g.self_id().clone())
    }

    pub fn add_edge(
        &self,
        a: &NodeId,
        b: &NodeId,
        weight: u32,
        origin: EdgeOrigin,
    ) -> Result<bool, GraphError> {
        self.with(|g| g.add_edge(a, b, weight, origin))?
    }

    pub fn remove_edge(&self, a: &NodeId, b: &NodeId) -> Result<bool, GraphError> {
        self.with(|g| g.remove_edge(a, b))?
    }

    pub fn evict_node(&self, id: &NodeId) -> Result<bool, GraphError> {
        self.with(|g| g.evict_node(id))?
    }

    pub fn node_seen(&self, id: &NodeId) -> Result<bool, GraphError> {
        self.with(|g| g.node_seen(id))
    }

    pub fn apply_announcement(
        &self,
        from: &NodeId,
        announcement: &EdgeAnnouncement,
    ) -> Result<bool, GraphError> {
        self.with(|g| g.apply_announcement(from, announcement))?
    }

    pub fn drain_outbox(&self) -> Result<Vec<Outbound>, GraphError> {
        self.with(Graph::drain_outbox)
    }

    pub fn next_hop(&self, id: &NodeId) -> Result<Option<NodeId>, GraphError> {
        self.with(|g| g.next_hop(id))
    }

    pub fn is_reachable(&self, id: &NodeId) -> Result<bool, GraphError> {
        self.with(|g| g.is_reachable(id))
    }

    pub fn broadcast_targets(&self, arrived_from: Option<&NodeId>) -> Result<Vec<NodeId>, GraphError> {
        self.with(|g| g.broadcast_targets(arrived_from))
    }

    pub fn broadcast_edges(&self) -> Result<Vec<(NodeId, NodeId)>, GraphError> {
        self.with(Graph::broadcast_edges)
    }

    pub fn route_subnet(&self, subnet: &Subnet) -> Result<Option<NodeId>, GraphError> {
        self.with(|g| g.route_subnet(subnet))
    }

    pub fn snapshot(&self) -> Result<RoutingSnapshot, GraphError> {
        self.with(Graph::snapshot)
    }

    pub fn add_listener(&self, listener: Box<dyn TopologyListener>) -> Result<(), GraphError> {
        self.with(|g| g.add_listener(listener))
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<TopologyChange>, GraphError> {
        self.with(|g| g.subscribe())
    }
}
