use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use meshd_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Weight assigned to a tunnel when the session layer gives none.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Normalized key for an unordered node pair. The lower id is always `low`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    low: NodeId,
    high: NodeId,
}

impl EdgeKey {
    /// Build a key for `(a, b)`. Self-loops are malformed.
    pub fn new(a: &NodeId, b: &NodeId) -> Result<Self, GraphError> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Ok(Self {
                low: a.clone(),
                high: b.clone(),
            }),
            std::cmp::Ordering::Greater => Ok(Self {
                low: b.clone(),
                high: a.clone(),
            }),
            std::cmp::Ordering::Equal => Err(GraphError::malformed(format!(
                "self-referential edge {}-{}",
                a, b
            ))),
        }
    }

    pub fn low(&self) -> &NodeId {
        &self.low
    }

    pub fn high(&self) -> &NodeId {
        &self.high
    }

    pub fn touches(&self, id: &NodeId) -> bool {
        &self.low == id || &self.high == id
    }

    /// The endpoint opposite `id`, if `id` is an endpoint at all.
    pub fn other(&self, id: &NodeId) -> Option<&NodeId> {
        if &self.low == id {
            Some(&self.high)
        } else if &self.high == id {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Where an edge record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOrigin {
    /// A tunnel this node authenticated itself.
    Local,
    /// Learned from a neighbor's announcement.
    Gossiped,
}

/// A known tunnel between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub key: EdgeKey,
    /// Larger is less preferred.
    pub weight: u32,
    pub origin: EdgeOrigin,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(key: EdgeKey, weight: u32, origin: EdgeOrigin) -> Self {
        Self {
            key,
            weight,
            origin,
            updated_at: Utc::now(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == EdgeOrigin::Local
    }
}

/// Result of writing an edge into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// One record per unordered node pair.
#[derive(Debug, Default)]
pub struct EdgeRegistry {
    edges: HashMap<EdgeKey, Edge>,
}

impl EdgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Insert a new edge or update weight/origin of an existing one.
    pub(crate) fn upsert(&mut self, key: EdgeKey, weight: u32, origin: EdgeOrigin) -> Upsert {
        match self.edges.get_mut(&key) {
            Some(edge) if edge.weight == weight && edge.origin == origin => Upsert::Unchanged,
            Some(edge) => {
                edge.weight = weight;
                edge.origin = origin;
                edge.updated_at = Utc::now();
                Upsert::Updated
            }
            None => {
                self.edges
                    .insert(key.clone(), Edge::new(key, weight, origin));
                Upsert::Inserted
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &EdgeKey) -> Option<Edge> {
        self.edges.remove(key)
    }

    /// Remove every edge touching `id`, returning them in key order.
    pub(crate) fn remove_touching(&mut self, id: &NodeId) -> Vec<Edge> {
        let mut keys: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|k| k.touches(id))
            .cloned()
            .collect();
        keys.sort();
        keys.iter().filter_map(|k| self.edges.remove(k)).collect()
    }

    pub fn touching<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |e| e.key.touches(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
