use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::Utc;
use meshd_core::NodeId;

use crate::edge::{Edge, EdgeKey};
use crate::facade::TopologyChange;
use crate::graph::Graph;
use crate::node::NodeStatus;
use crate::shared::DispatchGuard;

/// An edge offered to the growing tree. Field order is the selection order:
/// cheapest edge first, ties broken by the normalized key, so every edge has
/// a distinct rank and the resulting tree is the same whichever node grows it.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate<'a> {
    weight: u32,
    key: &'a EdgeKey,
    parent: &'a NodeId,
    node: &'a NodeId,
}

/// Where a reached node sits in the tree.
struct Placement {
    distance: u64,
    via: NodeId,
    mst_edge: Option<EdgeKey>,
}

impl Graph {
    /// Rebuild the spanning tree rooted at the local node and refresh every
    /// node's reachability, distance and next hop.
    ///
    /// Always runs, even when the graph is clean; clears `dirty`, bumps the
    /// generation and notifies listeners exactly once.
    pub fn recompute(&mut self) -> TopologyChange {
        self.dirty = false;
        self.generation += 1;

        let mut tree = self.grow_tree();
        let now = Utc::now();
        let mut became_reachable = Vec::new();
        let mut became_unreachable = Vec::new();

        for node in self.nodes.iter_mut() {
            let previous = node.status;
            match tree.remove(node.id()) {
                Some(placement) => {
                    node.status = NodeStatus::Reachable;
                    node.distance = placement.distance;
                    node.via = Some(placement.via);
                    node.mst_edge = placement.mst_edge;
                }
                None => {
                    node.status = NodeStatus::Unreachable;
                    node.clear_placement();
                }
            }

            if previous == node.status {
                continue;
            }
            node.status_changed_at = now;
            match node.status {
                NodeStatus::Reachable => became_reachable.push(node.id().clone()),
                _ if previous == NodeStatus::Reachable => {
                    became_unreachable.push(node.id().clone())
                }
                _ => {}
            }
        }

        became_reachable.sort();
        became_unreachable.sort();
        for id in &became_reachable {
            tracing::info!(node = %id, "node became reachable");
        }
        for id in &became_unreachable {
            tracing::info!(node = %id, "node became unreachable");
        }

        let change = TopologyChange {
            generation: self.generation,
            reachable: self.nodes.iter().filter(|n| n.is_reachable()).count(),
            became_reachable,
            became_unreachable,
        };
        tracing::debug!(
            generation = change.generation,
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            reachable = change.reachable,
            "topology recomputed"
        );

        self.notify(&change);
        change
    }

    /// Recompute only if a mutation happened since the last pass.
    pub(crate) fn refresh(&mut self) {
        if self.dirty {
            self.recompute();
        }
    }

    /// Prim's algorithm over the edge registry with a lazily pruned heap.
    fn grow_tree(&self) -> HashMap<NodeId, Placement> {
        let mut adjacency: HashMap<&NodeId, Vec<(&NodeId, &Edge)>> = HashMap::new();
        for edge in self.edges.iter() {
            let (low, high) = (edge.key.low(), edge.key.high());
            adjacency.entry(low).or_default().push((high, edge));
            adjacency.entry(high).or_default().push((low, edge));
        }

        let root = self.self_id();
        let mut tree = HashMap::with_capacity(self.nodes.len());
        tree.insert(
            root.clone(),
            Placement {
                distance: 0,
                via: root.clone(),
                mst_edge: None,
            },
        );

        let mut frontier = BinaryHeap::new();
        offer(&mut frontier, &adjacency, root, &tree);

        while let Some(Reverse(candidate)) = frontier.pop() {
            if tree.contains_key(candidate.node) {
                continue;
            }
            let Some(parent) = tree.get(candidate.parent) else {
                continue;
            };

            // Only Local edges touch the root, so its children are neighbors
            // and everything below inherits the first hop.
            let via = if candidate.parent == root {
                candidate.node.clone()
            } else {
                parent.via.clone()
            };
            let placement = Placement {
                distance: parent.distance + u64::from(candidate.weight),
                via,
                mst_edge: Some(candidate.key.clone()),
            };

            tree.insert(candidate.node.clone(), placement);
            offer(&mut frontier, &adjacency, candidate.node, &tree);
        }

        tree
    }

    fn notify(&mut self, change: &TopologyChange) {
        {
            let _guard = DispatchGuard::enter();
            for listener in self.listeners.iter_mut() {
                listener.on_topology_changed(change);
            }
        }
        // No subscribers is not an error.
        let _ = self.events.send(change.clone());
    }
}

fn offer<'a>(
    frontier: &mut BinaryHeap<Reverse<Candidate<'a>>>,
    adjacency: &HashMap<&'a NodeId, Vec<(&'a NodeId, &'a Edge)>>,
    from: &'a NodeId,
    tree: &HashMap<NodeId, Placement>,
) {
    let Some(links) = adjacency.get(from) else {
        return;
    };
    for &(to, edge) in links {
        if tree.contains_key(to) {
            continue;
        }
        frontier.push(Reverse(Candidate {
            weight: edge.weight,
            key: &edge.key,
            parent: from,
            node: to,
        }));
    }
}
