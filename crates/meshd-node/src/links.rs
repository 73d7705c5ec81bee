//! Outbound channels to directly connected neighbors.

use dashmap::DashMap;
use meshd_core::NodeId;
use tokio::sync::mpsc;

use crate::events::PeerMessage;

/// One sender per neighbor with a live tunnel.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: DashMap<NodeId, mpsc::Sender<PeerMessage>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the outbound channel for `peer`, replacing any previous one.
    pub fn register(&self, peer: NodeId, link: mpsc::Sender<PeerMessage>) {
        if self.links.insert(peer.clone(), link).is_some() {
            tracing::debug!(peer = %peer, "replaced existing link");
        }
    }

    pub fn unregister(&self, peer: &NodeId) -> bool {
        self.links.remove(peer).is_some()
    }

    /// Queue `message` for `peer` without waiting. Returns `false` if the
    /// peer has no link or its queue is full or closed.
    pub fn send(&self, peer: &NodeId, message: PeerMessage) -> bool {
        let Some(link) = self.links.get(peer) else {
            tracing::debug!(peer = %peer, "no link to peer");
            return false;
        };
        match link.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(peer = %peer, "link queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(peer = %peer, "link closed, dropping message");
                false
            }
        }
    }

    pub fn contains(&self, peer: &NodeId) -> bool {
        self.links.contains_key(peer)
    }

    /// Connected peers in ascending id order.
    pub fn peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.links.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
