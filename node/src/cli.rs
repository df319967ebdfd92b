//! # CLI Interface
//!
//! Defines the command-line argument structure for `aloc-node` using
//! `clap` derive. Supports three subcommands: `run`, `init` and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use aloc_protocol::config::{DEFAULT_DATA_DIR, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};

/// Automated Line of Credit node.
///
/// Hosts a single line-of-credit vault behind a JSON-RPC API, persists it
/// to disk after every operation, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "aloc-node",
    about = "Automated Line of Credit node",
    version,
    propagate_version = true
)]
pub struct AlocNodeCli {
    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "ALOC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, global = true, env = "ALOC_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Initialize a data directory with an example vault configuration.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the vault configuration file (JSON).
    ///
    /// When omitted, the node looks for `vault.json` in the data directory.
    #[arg(long, short = 'c', env = "ALOC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database and configuration.
    #[arg(long, short = 'd', env = "ALOC_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "ALOC_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ALOC_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}

impl RunArgs {
    /// The configuration file to load.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.data_dir.join(crate::config::CONFIG_FILE_NAME))
    }
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "ALOC_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}
