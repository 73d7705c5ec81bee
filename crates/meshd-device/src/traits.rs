use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DeviceKind;
use crate::error::DeviceError;

/// Byte counters since the device was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// The local virtual network interface.
///
/// The daemon owns exactly one device. A failed read or write abandons that
/// frame only; deciding when repeated failures become fatal is up to the
/// caller.
#[async_trait]
pub trait Device: Send {
    /// Read the next raw frame.
    async fn read(&mut self) -> Result<Vec<u8>, DeviceError>;

    /// Write one raw frame.
    async fn write(&mut self, frame: &[u8]) -> Result<(), DeviceError>;

    /// Release the underlying handle. Further reads and writes fail.
    async fn close(&mut self) -> Result<(), DeviceError>;

    fn stats(&self) -> DeviceStats;

    /// OS interface name, configured or derived from the device path.
    fn interface(&self) -> &str;

    fn kind(&self) -> DeviceKind;

    fn path(&self) -> &Path;
}
