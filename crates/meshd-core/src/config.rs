use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// How the daemon treats frames read from the local device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Route by network-layer destination. Needs a point-to-point device.
    Router,
    /// Learn layer-2 owners and unicast when the owner is known.
    #[default]
    Switch,
    /// Flood every frame over the broadcast tree.
    Hub,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Switch => "switch",
            Self::Hub => "hub",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "router" => Ok(Self::Router),
            "switch" => Ok(Self::Switch),
            "hub" => Ok(Self::Hub),
            _ => Err(CoreError::InvalidRoutingMode(s.to_string())),
        }
    }
}
