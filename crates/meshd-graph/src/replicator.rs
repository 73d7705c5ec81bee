use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use meshd_core::{NodeId, Subnet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::edge::{EdgeKey, EdgeOrigin, Upsert};
use crate::error::GraphError;
use crate::graph::Graph;

/// What an announcement asks the receiver to do with an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementKind {
    Add { weight: u32 },
    Remove,
}

/// A gossiped edge change, exchanged between connected neighbors.
///
/// The id is assigned once by the originating node and kept unchanged as
/// the announcement is forwarded, so traces can follow it across the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAnnouncement {
    pub id: Uuid,
    pub kind: AnnouncementKind,
    pub a: NodeId,
    pub b: NodeId,
    pub created_at: DateTime<Utc>,
}

impl EdgeAnnouncement {
    pub fn add(a: NodeId, b: NodeId, weight: u32) -> Self {
        Self::new(AnnouncementKind::Add { weight }, a, b)
    }

    pub fn remove(a: NodeId, b: NodeId) -> Self {
        Self::new(AnnouncementKind::Remove, a, b)
    }

    fn new(kind: AnnouncementKind, a: NodeId, b: NodeId) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            a,
            b,
            created_at: Utc::now(),
        }
    }

    /// The normalized edge key. Fails for self-referential announcements.
    pub fn key(&self) -> Result<EdgeKey, GraphError> {
        EdgeKey::new(&self.a, &self.b)
    }
}

/// An announcement queued for delivery to one neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: NodeId,
    pub announcement: EdgeAnnouncement,
}

/// Counters describing what the replicator did with incoming updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicatorStats {
    /// Updates that changed the registries.
    pub accepted: u64,
    /// Updates identical to current state, dropped silently.
    pub duplicates: u64,
    /// Malformed updates refused at the boundary.
    pub rejected: u64,
    /// Gossip that disagreed with our own tunnel state.
    pub contradicting: u64,
}

impl Graph {
    /// Insert or update the edge `(a, b)`.
    ///
    /// Endpoints are registered as `Known` if new. A Local edge must touch
    /// the local node; when it changes state it is announced to every other
    /// connected neighbor, and a brand new tunnel additionally receives our
    /// full edge set so the new neighbor converges without waiting for
    /// further gossip. Returns `Ok(false)` for no-op updates.
    pub fn add_edge(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        weight: u32,
        origin: EdgeOrigin,
    ) -> Result<bool, GraphError> {
        let key = EdgeKey::new(a, b).map_err(|e| self.reject(e))?;
        match origin {
            EdgeOrigin::Local if !key.touches(self.self_id()) => {
                return Err(self.reject(GraphError::malformed(format!(
                    "local edge {} does not touch local node {}",
                    key,
                    self.self_id()
                ))));
            }
            EdgeOrigin::Gossiped if key.touches(self.self_id()) => {
                return Err(self.reject(GraphError::malformed(format!(
                    "gossiped edge {} touches local node {}",
                    key,
                    self.self_id()
                ))));
            }
            _ => {}
        }

        let outcome = self.write_edge(key.clone(), weight, origin);
        if outcome == Upsert::Unchanged {
            return Ok(false);
        }

        if origin == EdgeOrigin::Local {
            // The peer on the other end learns the tunnel from its own
            // session layer, never from us.
            let peer = key.other(self.self_id()).cloned();
            let announcement =
                EdgeAnnouncement::add(key.low().clone(), key.high().clone(), weight);
            self.announce(&announcement, peer.as_ref());

            if let (Upsert::Inserted, Some(peer)) = (outcome, peer) {
                self.queue_full_sync(&peer, &key);
            }
        }

        Ok(true)
    }

    /// Delete the edge `(a, b)` and announce the removal to neighbors.
    /// Removing an unknown edge is a no-op.
    pub fn remove_edge(&mut self, a: &NodeId, b: &NodeId) -> Result<bool, GraphError> {
        let key = EdgeKey::new(a, b).map_err(|e| self.reject(e))?;
        if !self.erase_edge(&key) {
            return Ok(false);
        }
        let announcement = EdgeAnnouncement::remove(key.low().clone(), key.high().clone());
        self.announce(&announcement, None);
        Ok(true)
    }

    /// Remove a node and every edge touching it.
    pub fn evict_node(&mut self, id: &NodeId) -> Result<bool, GraphError> {
        if id == self.self_id() {
            let err = GraphError::SelfEviction(id.clone());
            tracing::warn!(error = %err, "eviction refused");
            return Err(err);
        }
        if self.nodes.remove(id).is_none() {
            return Ok(false);
        }
        let purged = self.edges.remove_touching(id);
        self.mark_dirty();
        tracing::info!(node = %id, edges = purged.len(), "node evicted");
        Ok(true)
    }

    /// Register a node the session layer has seen a handshake from.
    pub fn node_seen(&mut self, id: &NodeId) -> bool {
        let inserted = self.nodes.insert_known(id);
        if inserted {
            self.mark_dirty();
            tracing::debug!(node = %id, "node registered");
        }
        inserted
    }

    /// Replace the subnet claims of a node. Returns `true` if they changed.
    pub fn set_subnets(&mut self, id: &NodeId, subnets: BTreeSet<Subnet>) -> bool {
        let inserted = self.nodes.insert_known(id);
        let changed = match self.nodes.get_mut(id) {
            Some(node) if node.subnets != subnets => {
                node.subnets = subnets;
                true
            }
            _ => false,
        };
        if inserted || changed {
            self.mark_dirty();
            tracing::debug!(node = %id, "subnet claims updated");
        }
        changed
    }

    /// Apply an announcement received from the connected neighbor `from`.
    ///
    /// Accepted changes are forwarded to every other neighbor; updates that
    /// match current state stop here, which is what terminates flooding.
    /// Announcements about our own tunnels are only ever echoes: if they
    /// agree with local state they are dropped, otherwise they are rejected
    /// as contradicting and `from` is sent our actual state of the edge.
    pub fn apply_announcement(
        &mut self,
        from: &NodeId,
        announcement: &EdgeAnnouncement,
    ) -> Result<bool, GraphError> {
        if !self.is_neighbor(from) {
            return Err(self.reject(GraphError::malformed(format!(
                "announcement {} from {} which is not a connected neighbor",
                announcement.id, from
            ))));
        }
        let key = announcement.key().map_err(|e| self.reject(e))?;

        if key.touches(self.self_id()) {
            let agrees = match announcement.kind {
                AnnouncementKind::Add { weight } => self
                    .edges
                    .get(&key)
                    .map_or(false, |e| e.is_local() && e.weight == weight),
                AnnouncementKind::Remove => !self.edges.contains(&key),
            };
            if agrees {
                self.stats.duplicates += 1;
                return Ok(false);
            }
            self.stats.contradicting += 1;
            self.queue_correction(from, &key);
            return Err(self.reject(GraphError::malformed(format!(
                "announcement {} for {} contradicts local tunnel state",
                announcement.id, key
            ))));
        }

        let changed = match announcement.kind {
            AnnouncementKind::Add { weight } => {
                self.write_edge(key, weight, EdgeOrigin::Gossiped) != Upsert::Unchanged
            }
            AnnouncementKind::Remove => {
                let removed = self.erase_edge(&key);
                if !removed {
                    self.stats.duplicates += 1;
                }
                removed
            }
        };

        if changed {
            self.announce(announcement, Some(from));
        }
        Ok(changed)
    }

    /// Take every announcement queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Write an edge, refusing to let gossip overwrite a Local record.
    fn write_edge(&mut self, key: EdgeKey, weight: u32, origin: EdgeOrigin) -> Upsert {
        let local_exists = self.edges.get(&key).map_or(false, |e| e.is_local());
        if local_exists && origin == EdgeOrigin::Gossiped {
            self.stats.duplicates += 1;
            tracing::debug!(edge = %key, "ignoring gossip for a local edge");
            return Upsert::Unchanged;
        }

        let outcome = self.edges.upsert(key.clone(), weight, origin);
        if outcome == Upsert::Unchanged {
            self.stats.duplicates += 1;
            return outcome;
        }

        self.nodes.insert_known(key.low());
        self.nodes.insert_known(key.high());
        self.mark_dirty();
        self.stats.accepted += 1;
        tracing::debug!(edge = %key, weight, ?origin, ?outcome, "edge written");
        outcome
    }

    fn erase_edge(&mut self, key: &EdgeKey) -> bool {
        match self.edges.remove(key) {
            Some(edge) => {
                self.mark_dirty();
                self.stats.accepted += 1;
                tracing::debug!(edge = %key, origin = ?edge.origin, "edge removed");
                true
            }
            None => false,
        }
    }

    fn announce(&mut self, announcement: &EdgeAnnouncement, except: Option<&NodeId>) {
        for neighbor in self.neighbors() {
            if Some(&neighbor) == except {
                continue;
            }
            self.outbox.push(Outbound {
                to: neighbor,
                announcement: announcement.clone(),
            });
        }
    }

    /// Queue every known edge except `skip` for a freshly connected neighbor.
    fn queue_full_sync(&mut self, neighbor: &NodeId, skip: &EdgeKey) {
        let mut edges: Vec<(EdgeKey, u32)> = self
            .edges
            .iter()
            .filter(|e| &e.key != skip)
            .map(|e| (e.key.clone(), e.weight))
            .collect();
        edges.sort();

        tracing::debug!(neighbor = %neighbor, edges = edges.len(), "queueing full topology sync");
        for (key, weight) in edges {
            self.outbox.push(Outbound {
                to: neighbor.clone(),
                announcement: EdgeAnnouncement::add(key.low().clone(), key.high().clone(), weight),
            });
        }
    }

    /// Tell `to` what we really know about one of our own edges.
    fn queue_correction(&mut self, to: &NodeId, key: &EdgeKey) {
        let announcement = match self.edges.get(key) {
            Some(edge) => EdgeAnnouncement::add(key.low().clone(), key.high().clone(), edge.weight),
            None => EdgeAnnouncement::remove(key.low().clone(), key.high().clone()),
        };
        tracing::debug!(edge = %key, neighbor = %to, kind = ?announcement.kind, "correcting stale gossip");
        self.outbox.push(Outbound {
            to: to.clone(),
            announcement,
        });
    }

    fn reject(&mut self, err: GraphError) -> GraphError {
        self.stats.rejected += 1;
        tracing::warn!(error = %err, "rejected topology update");
        err
    }
}
