//! meshd - entry point.
//!
//! Starts the mesh daemon with configuration from a TOML file or defaults.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meshd_node::{MeshConfig, MeshNode};

/// Mesh VPN daemon
#[derive(Parser, Debug)]
#[command(name = "meshd", version, about = "Mesh VPN daemon")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "meshd.toml")]
    config: PathBuf,

    /// Override the node name.
    #[arg(long)]
    name: Option<String>,

    /// Override the device path.
    #[arg(long)]
    device: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if args.init {
        MeshConfig::default()
    } else {
        MeshConfig::load(&args.config)?
    };

    // Apply CLI overrides
    if let Some(name) = args.name {
        config.node.name = name;
    }
    if let Some(device) = args.device {
        config.device.device = Some(device);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, &config.logging.format);

    // Handle --init flag
    if args.init {
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    tracing::info!("meshd v{}", env!("CARGO_PKG_VERSION"));

    // Create and start the node
    let mut node = MeshNode::new(config)?;
    node.start().await?;

    let mut result = Ok(());
    tokio::select! {
        outcome = node.run() => {
            if let Err(e) = &outcome {
                tracing::error!(error = %e, "node event loop error");
            }
            result = outcome;
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("received shutdown signal"),
                Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
            }
        }
    }

    node.shutdown().await?;
    tracing::info!("meshd exited");
    result
}
