//! Forwarding decisions for frames read from the device or received from
//! neighbors. Pure functions over the routing facade; the caller performs
//! the actual sends.

use meshd_core::{NodeId, RoutingMode, Subnet};
use meshd_graph::Graph;

use crate::events::MeshFrame;

pub const ETHERNET_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;
const IPV4_DESTINATION: std::ops::Range<usize> = 30..34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Too short to carry the headers the routing mode needs.
    Runt,
    /// The owner, or the addressed node, has no path from here.
    Unreachable,
    /// Addressed to ourselves; nothing to send.
    Loopback,
}

/// What to do with one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Send towards `destination` through the neighbor `next_hop`.
    Unicast {
        next_hop: NodeId,
        destination: NodeId,
    },
    /// Send a broadcast copy to each listed neighbor.
    Flood(Vec<NodeId>),
    /// Write to the local device.
    Local,
    Drop(DropReason),
}

/// Route a frame read from the local device.
///
/// In switch mode the frame's source MAC is claimed for the local node
/// before the destination is looked up.
pub fn route_local_frame(graph: &mut Graph, mode: RoutingMode, frame: &[u8]) -> Delivery {
    if frame.len() < ETHERNET_HEADER_LEN {
        return Delivery::Drop(DropReason::Runt);
    }

    match mode {
        RoutingMode::Hub => Delivery::Flood(graph.broadcast_targets(None)),
        RoutingMode::Switch => {
            learn_source(graph, frame);
            let Some(destination) = mac_at(frame, 0) else {
                return Delivery::Drop(DropReason::Runt);
            };
            if is_multicast(&destination) {
                return Delivery::Flood(graph.broadcast_targets(None));
            }
            match graph.route_subnet(&Subnet::from_mac(&destination)) {
                Some(owner) => unicast_to(graph, owner),
                // Unknown owner: flood like a learning switch would.
                None => Delivery::Flood(graph.broadcast_targets(None)),
            }
        }
        RoutingMode::Router => {
            let Some(key) = ipv4_destination(frame) else {
                return Delivery::Drop(DropReason::Runt);
            };
            match graph.route_subnet(&key) {
                Some(owner) => unicast_to(graph, owner),
                None => Delivery::Drop(DropReason::Unreachable),
            }
        }
    }
}

/// Route a frame received from the neighbor `from`.
///
/// Broadcasts are delivered locally and passed on along the spanning tree,
/// never back over the link they arrived on.
pub fn route_peer_frame(graph: &mut Graph, from: &NodeId, frame: &MeshFrame) -> Vec<Delivery> {
    match &frame.destination {
        Some(destination) if destination == graph.self_id() => vec![Delivery::Local],
        Some(destination) => match graph.next_hop(destination) {
            Some(next_hop) => vec![Delivery::Unicast {
                next_hop,
                destination: destination.clone(),
            }],
            None => vec![Delivery::Drop(DropReason::Unreachable)],
        },
        None => {
            let targets = graph.broadcast_targets(Some(from));
            if targets.is_empty() {
                vec![Delivery::Local]
            } else {
                vec![Delivery::Local, Delivery::Flood(targets)]
            }
        }
    }
}

fn unicast_to(graph: &mut Graph, owner: NodeId) -> Delivery {
    if &owner == graph.self_id() {
        return Delivery::Drop(DropReason::Loopback);
    }
    match graph.next_hop(&owner) {
        Some(next_hop) => Delivery::Unicast {
            next_hop,
            destination: owner,
        },
        None => Delivery::Drop(DropReason::Unreachable),
    }
}

/// Claim the frame's source MAC for the local node. Returns `true` if new.
fn learn_source(graph: &mut Graph, frame: &[u8]) -> bool {
    let Some(source) = mac_at(frame, 6) else {
        return false;
    };
    if is_multicast(&source) {
        return false;
    }

    let self_id = graph.self_id().clone();
    let subnet = Subnet::from_mac(&source);
    let mut claims = match graph.node(&self_id) {
        Some(node) if node.subnets().contains(&subnet) => return false,
        Some(node) => node.subnets().clone(),
        None => return false,
    };
    tracing::debug!(mac = %subnet, "learned local address");
    claims.insert(subnet);
    graph.set_subnets(&self_id, claims)
}

fn mac_at(frame: &[u8], offset: usize) -> Option<[u8; 6]> {
    frame.get(offset..offset + 6)?.try_into().ok()
}

fn is_multicast(mac: &[u8; 6]) -> bool {
    mac[0] & 0x01 != 0
}

/// The IPv4 destination address as a subnet key, e.g. `10.1.0.7`.
fn ipv4_destination(frame: &[u8]) -> Option<Subnet> {
    let ethertype = u16::from_be_bytes([*frame.get(12)?, *frame.get(13)?]);
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }
    let addr = frame.get(IPV4_DESTINATION)?;
    let key = format!("{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3]);
    Subnet::new(key).ok()
}
