//! Daemon configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::Context;
use meshd_core::{NodeId, RoutingMode};
use meshd_device::DeviceConfig;
use serde::{Deserialize, Serialize};

/// Full configuration for the meshd daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeshConfig {
    /// Local identity.
    #[serde(default)]
    pub node: NodeSection,

    /// Virtual network device.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Routing behavior and unreachable-node eviction.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event loop tuning.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    /// Node name, used as the node id when no public key is configured.
    #[serde(default = "default_name")]
    pub name: String,
    /// Public key whose fingerprint becomes the node id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,
    /// How long a node may stay unreachable before it is evicted.
    #[serde(default = "default_unreachable_timeout")]
    pub unreachable_timeout_secs: u64,
    /// Interval between eviction sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Consecutive device failures tolerated before shutting down.
    #[serde(default = "default_max_device_errors")]
    pub max_device_errors: u32,
    /// Capacity of the session event and per-link queues.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

// Default value functions
fn default_name() -> String {
    "meshd".into()
}
fn default_unreachable_timeout() -> u64 {
    600
}
fn default_sweep_interval() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_max_device_errors() -> u32 {
    10
}
fn default_event_channel_capacity() -> usize {
    256
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            public_key_file: None,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            unreachable_timeout_secs: default_unreachable_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_device_errors: default_max_device_errors(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl MeshConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: MeshConfig = toml::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The local node id: the public key fingerprint if a key file is
    /// configured, the node name otherwise.
    pub fn node_id(&self) -> anyhow::Result<NodeId> {
        match &self.node.public_key_file {
            Some(path) => {
                let key = std::fs::read(path)
                    .with_context(|| format!("reading public key {}", path.display()))?;
                Ok(NodeId::from_public_key(&key))
            }
            None => Ok(NodeId::new(self.node.name.clone())?),
        }
    }
}
