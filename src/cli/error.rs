//! CLI error types and conversions

use crate::config::ConfigError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::resume::ResumeError;
use crate::sync::SyncError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sync error
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Resume error
    #[error("resume error: {0}")]
    Resume(#[from] ResumeError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store failed validation
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}
