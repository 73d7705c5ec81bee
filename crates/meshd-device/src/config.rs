use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use meshd_core::RoutingMode;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Device opened when none is configured.
pub const DEFAULT_TAP_DEVICE: &str = "/dev/tap0";

/// Ethernet frame size; also the per-read buffer size.
pub const DEFAULT_MTU: usize = 1518;

const MAX_MTU: usize = 65535;

/// Supported device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Layer-2 tap device carrying Ethernet frames.
    Tap,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Tap => "tap",
        }
    }

    /// Whether the device carries whole Ethernet frames.
    pub fn supports_switch(&self) -> bool {
        matches!(self, DeviceKind::Tap)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tap") {
            Ok(DeviceKind::Tap)
        } else {
            Err(ConfigError::UnknownDeviceType(s.to_string()))
        }
    }
}

/// The `[device]` configuration section, as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Path of the device node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
    /// Device kind, matched case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// Expected OS interface name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default = "default_mtu")]
    pub mtu: usize,
}

fn default_mtu() -> usize {
    DEFAULT_MTU
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device: None,
            device_type: None,
            interface: None,
            mtu: DEFAULT_MTU,
        }
    }
}

/// A validated device configuration, ready to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub path: PathBuf,
    pub kind: DeviceKind,
    pub interface: Option<String>,
    pub mtu: usize,
}

impl DeviceConfig {
    /// Decide which device to open under `mode`.
    ///
    /// Without an explicit path the default tap device is used, except in
    /// router mode which has no default. Without an explicit type the kind
    /// is inferred from the path or the mode.
    pub fn resolve(&self, mode: RoutingMode) -> Result<DeviceSpec, ConfigError> {
        if self.mtu == 0 || self.mtu > MAX_MTU {
            return Err(ConfigError::InvalidMtu(self.mtu));
        }

        let path = match &self.device {
            Some(path) => path.clone(),
            None if mode == RoutingMode::Router => return Err(ConfigError::RouterModeUnsupported),
            None => PathBuf::from(DEFAULT_TAP_DEVICE),
        };

        let kind = match &self.device_type {
            Some(name) => name.parse::<DeviceKind>()?,
            None if path.to_string_lossy().contains("tap") || mode != RoutingMode::Router => {
                DeviceKind::Tap
            }
            None => return Err(ConfigError::CannotInferDeviceType(path)),
        };

        if mode == RoutingMode::Switch && !kind.supports_switch() {
            return Err(ConfigError::SwitchModeRequiresTap);
        }

        Ok(DeviceSpec {
            path,
            kind,
            interface: self.interface.clone(),
            mtu: self.mtu,
        })
    }
}
