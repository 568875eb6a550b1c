//! CLI command implementations

use crate::config::SyncConfig;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub mod error;
pub mod render;
pub mod status;
pub mod sync;
pub mod validate;

pub use error::CliError;
pub use render::{EnrichArgs, ExportArgs};
pub use status::StatusArgs;
pub use sync::SyncArgs;
pub use validate::ValidateArgs;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Slack History Sync CLI
#[derive(Parser, Debug)]
#[command(name = "slack-history-sync")]
#[command(about = "Mirror Slack conversation history into a dated local store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: <config_dir>/slack-history-sync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root, overrides `storage_location` from the config file
    #[arg(long, global = true)]
    pub storage_location: Option<PathBuf>,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync users, channels, messages and threads into the store
    Sync(SyncArgs),

    /// Show per-day completion flags
    Status(StatusArgs),

    /// Check that the status file and every shard parse
    Validate(ValidateArgs),

    /// Add user and channel names to synced threads
    Enrich(EnrichArgs),

    /// Render enriched days as org-mode files
    Export(ExportArgs),
}

impl Cli {
    /// Configuration from `--config` or the default location
    pub fn file_config(&self) -> Result<SyncConfig, CliError> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => match SyncConfig::default_path() {
                Some(path) => path,
                None => return Ok(SyncConfig::default()),
            },
        };
        Ok(SyncConfig::load(&path)?)
    }

    /// Store root from the command line, else from the config file
    pub fn store_root(&self) -> Result<PathBuf, CliError> {
        if let Some(root) = &self.storage_location {
            return Ok(root.clone());
        }
        self.file_config()?
            .storage_location
            .ok_or(CliError::Config(crate::config::ConfigError::Missing(
                "storage_location",
            )))
    }
}
