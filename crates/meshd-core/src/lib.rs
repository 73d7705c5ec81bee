//! meshd core: identifiers and shared vocabulary for the mesh daemon.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here: [`NodeId`] for mesh participants, [`Subnet`] for opaque ownership
//! keys, and [`RoutingMode`] for how the daemon treats local frames.

pub mod config;
pub mod error;
pub mod types;

pub use config::RoutingMode;
pub use error::CoreError;
pub use types::{NodeId, Subnet};
