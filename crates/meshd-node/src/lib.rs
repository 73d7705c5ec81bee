//! meshd daemon internals.
//!
//! The binary in `main.rs` is a thin wrapper around [`MeshNode`]; everything
//! else lives here so it can be driven from tests.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod links;
pub mod node;
pub mod state;

pub use config::MeshConfig;
pub use dispatch::{Delivery, DropReason};
pub use events::{MeshFrame, PeerMessage, SessionEvent};
pub use links::LinkTable;
pub use node::MeshNode;
pub use state::{NodeState, NodeStats};
