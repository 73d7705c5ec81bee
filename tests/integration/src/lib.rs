//! In-memory mesh used by the integration tests.
//!
//! Each simulated node owns a [`Graph`]; [`Mesh::settle`] moves queued
//! announcements between neighbors until no node has anything left to say.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use meshd_core::NodeId;
use meshd_graph::{EdgeOrigin, Graph};

/// Rounds after which gossip is considered to be looping.
const MAX_ROUNDS: usize = 1_000;

pub fn id(name: &str) -> NodeId {
    name.parse().expect("valid node id")
}

/// A set of nodes exchanging topology gossip over simulated tunnels.
pub struct Mesh {
    graphs: BTreeMap<NodeId, Graph>,
    /// Announcements delivered so far.
    pub delivered: usize,
    /// Announcements the receiver refused.
    pub refused: usize,
}

impl Mesh {
    pub fn new(names: &[&str]) -> Self {
        let graphs = names
            .iter()
            .map(|name| (id(name), Graph::new(id(name))))
            .collect();
        Self {
            graphs,
            delivered: 0,
            refused: 0,
        }
    }

    pub fn graph(&mut self, name: &str) -> &mut Graph {
        self.graphs
            .get_mut(&id(name))
            .unwrap_or_else(|| panic!("no node {}", name))
    }

    pub fn names(&self) -> Vec<NodeId> {
        self.graphs.keys().cloned().collect()
    }

    /// Bring up a tunnel: both ends record it as Local, then gossip settles.
    pub fn connect(&mut self, a: &str, b: &str, weight: u32) {
        self.graph(a)
            .add_edge(&id(a), &id(b), weight, EdgeOrigin::Local)
            .expect("local edge");
        self.graph(b)
            .add_edge(&id(b), &id(a), weight, EdgeOrigin::Local)
            .expect("local edge");
        self.settle();
    }

    /// Tear down a tunnel on both ends, then let gossip settle.
    pub fn disconnect(&mut self, a: &str, b: &str) {
        self.graph(a).remove_edge(&id(a), &id(b)).expect("remove");
        self.graph(b).remove_edge(&id(b), &id(a)).expect("remove");
        self.settle();
    }

    /// Deliver queued announcements until every outbox is empty. Returns the
    /// number of rounds it took.
    pub fn settle(&mut self) -> usize {
        let mut rounds = 0;
        loop {
            let mut in_flight = VecDeque::new();
            for (from, graph) in self.graphs.iter_mut() {
                for outbound in graph.drain_outbox() {
                    in_flight.push_back((from.clone(), outbound));
                }
            }
            if in_flight.is_empty() {
                return rounds;
            }

            rounds += 1;
            assert!(rounds < MAX_ROUNDS, "gossip did not settle");

            while let Some((from, outbound)) = in_flight.pop_front() {
                let Some(graph) = self.graphs.get_mut(&outbound.to) else {
                    continue;
                };
                self.delivered += 1;
                if graph.apply_announcement(&from, &outbound.announcement).is_err() {
                    self.refused += 1;
                }
            }
        }
    }

    /// Every node's edge set as `(low, high, weight)` triples.
    pub fn edge_sets(&self) -> HashMap<NodeId, BTreeSet<(NodeId, NodeId, u32)>> {
        self.graphs
            .iter()
            .map(|(name, graph)| (name.clone(), edge_set(graph)))
            .collect()
    }
}

pub fn edge_set(graph: &Graph) -> BTreeSet<(NodeId, NodeId, u32)> {
    graph
        .edges()
        .iter()
        .map(|e| (e.key.low().clone(), e.key.high().clone(), e.weight))
        .collect()
}

/// Tree edges as unordered pairs, comparable between nodes.
pub fn tree_pairs(graph: &mut Graph) -> BTreeSet<(NodeId, NodeId)> {
    graph
        .broadcast_edges()
        .into_iter()
        .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
        .collect()
}
