//! # CLI Interface
//!
//! Defines the command-line argument structure for `meshgossip-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Mesh gossip node.
///
/// Joins a peer-discovery overlay, maintains membership via authenticated
/// heartbeats, disseminates presence and chat updates via bounded multi-hop
/// flooding, and exposes a membership count and chat stream to local
/// subscribers.
#[derive(Parser, Debug)]
#[command(
    name = "meshgossip-node",
    about = "Mesh gossip node",
    version,
    propagate_version = true
)]
pub struct MeshGossipCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the gossip node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gossip node.
    Run(RunArgs),
    /// Initialize a new node — generates and persists a keypair without
    /// joining the network.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory where the keypair is stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "MESHGOSSIP_DATA_DIR", default_value = "~/.meshgossip")]
    pub data_dir: PathBuf,

    /// TCP address to bind the reference overlay transport on.
    #[arg(long, env = "MESHGOSSIP_BIND_ADDR", default_value = "0.0.0.0:7946")]
    pub bind_addr: String,

    /// Overlay peer address to dial on startup (repeatable). When omitted,
    /// the node starts with no known peers and waits for inbound connections.
    #[arg(long = "peer", env = "MESHGOSSIP_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Address the ops HTTP surface (`/health`, `/status`, `/metrics`) binds to.
    #[arg(long, env = "MESHGOSSIP_HTTP_ADDR", default_value = "127.0.0.1:7947")]
    pub http_addr: String,

    /// Log level: trace, debug, info, warn, or error.
    #[arg(long, env = "MESHGOSSIP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: pretty or json.
    #[arg(long, env = "MESHGOSSIP_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Ephemeral identity: generate a fresh keypair instead of loading or
    /// persisting one. Useful for local testing with many nodes.
    #[arg(long)]
    pub ephemeral: bool,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "MESHGOSSIP_DATA_DIR", default_value = "~/.meshgossip")]
    pub data_dir: PathBuf,

    /// Overwrite an existing keypair if one is already present.
    #[arg(long)]
    pub force: bool,
}

/// Expands a leading `~` to the user's home directory.
pub fn resolve_data_dir(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs_home() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Minimal `$HOME` lookup — avoids pulling in the `dirs` crate for a
/// single environment variable read.
fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Validates a log level string against the levels `tracing` understands.
pub fn validate_log_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}
