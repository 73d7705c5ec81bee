//! meshd graph: the replicated mesh topology and the routing decisions
//! derived from it.
//!
//! This crate provides:
//! - [`NodeRegistry`] and [`EdgeRegistry`]: the known nodes and tunnels.
//! - The topology replicator on [`Graph`]: `add_edge`, `remove_edge`,
//!   `evict_node`, `apply_announcement`, with outgoing [`EdgeAnnouncement`]s
//!   collected in an outbox.
//! - The engine: `Graph::recompute` grows a minimum spanning tree rooted at
//!   the local node and derives reachability and next hops from it.
//! - The routing facade: `next_hop`, `broadcast_edges`, `broadcast_targets`,
//!   `route_subnet` and [`TopologyChange`] notifications.
//! - [`SharedGraph`]: a lock-protected handle for multi-task use.

pub mod edge;
pub mod engine;
pub mod error;
pub mod facade;
pub mod graph;
pub mod node;
pub mod replicator;
pub mod shared;

// Re-exports for convenience.
pub use edge::{Edge, EdgeKey, EdgeOrigin, EdgeRegistry, DEFAULT_WEIGHT};
pub use error::GraphError;
pub use facade::{NodeRoute, RoutingSnapshot, TopologyChange, TopologyListener};
pub use graph::Graph;
pub use node::{Node, NodeRegistry, NodeStatus};
pub use replicator::{AnnouncementKind, EdgeAnnouncement, Outbound, ReplicatorStats};
pub use shared::SharedGraph;
