//! meshd device layer
//!
//! Raw frame I/O against the local virtual network interface, behind the
//! [`Device`] trait, plus the configuration rules that decide which device
//! to open for a given routing mode.

pub mod adapters;
pub mod config;
pub mod error;
pub mod traits;

pub use adapters::{open, TapDevice};
pub use config::{DeviceConfig, DeviceKind, DeviceSpec, DEFAULT_MTU, DEFAULT_TAP_DEVICE};
pub use error::{ConfigError, DeviceError};
pub use traits::{Device, DeviceStats};
