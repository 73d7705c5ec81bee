use std::path::PathBuf;

/// Failures talking to an opened (or opening) device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error while reading from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error while writing to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device {0} is closed")]
    NotOpen(PathBuf),
}

/// Invalid or unsupported device configuration. Always fatal at startup.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown device type {0}")]
    UnknownDeviceType(String),

    #[error("router mode is not supported without an explicit device")]
    RouterModeUnsupported,

    #[error("cannot infer the device type of {0}")]
    CannotInferDeviceType(PathBuf),

    #[error("only tap devices support switch mode")]
    SwitchModeRequiresTap,

    #[error("invalid mtu {0}")]
    InvalidMtu(usize),
}
