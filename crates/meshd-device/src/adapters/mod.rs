mod tap;

pub use tap::TapDevice;

use crate::config::{DeviceKind, DeviceSpec};
use crate::error::DeviceError;
use crate::traits::Device;

/// Open the device described by a resolved configuration.
pub async fn open(spec: &DeviceSpec) -> Result<Box<dyn Device>, DeviceError> {
    match spec.kind {
        DeviceKind::Tap => Ok(Box::new(TapDevice::open(spec).await?)),
    }
}
