use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use meshd_core::{NodeId, Subnet};
use serde::{Deserialize, Serialize};

use crate::edge::EdgeKey;

/// Reachability of a node as of the last recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Present in the registry but not yet placed by a recompute.
    Known,
    /// A path from the local node exists in the known graph.
    Reachable,
    /// No path from the local node exists.
    Unreachable,
}

/// A participant in the mesh.
///
/// `distance`, `via` and `mst_edge` are written only by the engine and are
/// exposed through accessors that return `None` unless the node is
/// reachable, so stale values from an earlier tree can never leak out.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    pub(crate) status: NodeStatus,
    pub(crate) distance: u64,
    pub(crate) via: Option<NodeId>,
    pub(crate) mst_edge: Option<EdgeKey>,
    pub(crate) subnets: BTreeSet<Subnet>,
    pub(crate) status_changed_at: DateTime<Utc>,
}

impl Node {
    pub(crate) fn known(id: NodeId) -> Self {
        Self {
            id,
            status: NodeStatus::Known,
            distance: 0,
            via: None,
            mst_edge: None,
            subnets: BTreeSet::new(),
            status_changed_at: Utc::now(),
        }
    }

    pub(crate) fn root(id: NodeId) -> Self {
        let mut node = Self::known(id.clone());
        node.status = NodeStatus::Reachable;
        node.via = Some(id);
        node
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn is_reachable(&self) -> bool {
        self.status == NodeStatus::Reachable
    }

    /// Distance from the local node along the current tree.
    pub fn distance(&self) -> Option<u64> {
        self.is_reachable().then_some(self.distance)
    }

    /// The directly connected neighbor traffic for this node is sent to.
    pub fn via(&self) -> Option<&NodeId> {
        if self.is_reachable() {
            self.via.as_ref()
        } else {
            None
        }
    }

    /// The tree edge connecting this node to its parent.
    pub fn mst_edge(&self) -> Option<&EdgeKey> {
        if self.is_reachable() {
            self.mst_edge.as_ref()
        } else {
            None
        }
    }

    pub fn subnets(&self) -> &BTreeSet<Subnet> {
        &self.subnets
    }

    /// When the node last moved between reachable and unreachable.
    pub fn status_changed_at(&self) -> DateTime<Utc> {
        self.status_changed_at
    }

    pub(crate) fn clear_placement(&mut self) {
        self.distance = 0;
        self.via = None;
        self.mst_edge = None;
    }
}

/// One record per known node, keyed by id.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Insert a `Known` record unless one exists. Returns `true` if inserted.
    pub(crate) fn insert_known(&mut self, id: &NodeId) -> bool {
        if self.nodes.contains_key(id) {
            return false;
        }
        self.nodes.insert(id.clone(), Node::known(id.clone()));
        true
    }

    pub(crate) fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.nodes.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// All node ids in ascending order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
