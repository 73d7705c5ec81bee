//! Messages exchanged between the daemon, the session layer and peers.

use std::collections::BTreeSet;

use meshd_core::{NodeId, Subnet};
use meshd_graph::EdgeAnnouncement;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Input from the session (handshake/crypto) layer.
#[derive(Debug)]
pub enum SessionEvent {
    /// An authenticated tunnel to `peer` came up. Outbound traffic for the
    /// peer is handed to `link`.
    EdgeEstablished {
        peer: NodeId,
        weight: u32,
        link: mpsc::Sender<PeerMessage>,
    },

    /// The tunnel to `peer` went down.
    EdgeLost { peer: NodeId },

    /// A handshake from `node` was seen, before any tunnel exists.
    NodeSeen { node: NodeId },

    /// The session layer gave up on `node` entirely.
    NodeEvicted { node: NodeId },

    /// A topology announcement arrived from neighbor `from`.
    Gossip {
        from: NodeId,
        announcement: EdgeAnnouncement,
    },

    /// A data frame arrived from neighbor `from`.
    FrameReceived { from: NodeId, frame: MeshFrame },

    /// `node` claims ownership of `subnets`, replacing earlier claims.
    SubnetsAdvertised {
        node: NodeId,
        subnets: BTreeSet<Subnet>,
    },
}

/// Traffic sent to a directly connected neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    Gossip(EdgeAnnouncement),
    Frame(MeshFrame),
}

/// A raw device frame in transit across the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshFrame {
    /// Node whose device produced the frame.
    pub source: NodeId,
    /// Final recipient, or `None` for a broadcast over the spanning tree.
    pub destination: Option<NodeId>,
    pub payload: Vec<u8>,
}
