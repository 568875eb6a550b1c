//! Day-by-day synchronization engine
//!
//! # Overview
//!
//! A run walks a date range twice:
//!
//! 1. **Messages pass**: every eligible channel's window for the day is
//!    fetched, filtered and written to the `raw_messages` shard.
//! 2. **Threads pass**: the channels seen in the day's `raw_messages` shard are
//!    fetched again and every thread root gets its replies attached, written
//!    to the `raw_threads` shard.
//!
//! After each day the [`policy::CompletionPolicy`] decides whether the pass
//! may be frozen in the checkpoint store. Frozen days are skipped by later
//! runs unless forced.
//!
//! # Components
//!
//! - [`executor`] - The day driver
//! - [`job`] - Run parameters and summary
//! - [`policy`] - When a day may become final
//! - [`reconcile`] - Reply attachment for thread roots
//! - [`rate_limit`] - Request limiter shared by HTTP clients
//! - [`config`] - Retry, paging and lookback constants

use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::resume::{ResumeError, SyncFlag};
use chrono::NaiveDate;
use std::path::PathBuf;

pub mod config;
pub mod executor;
pub mod job;
pub mod policy;
pub mod rate_limit;
pub mod reconcile;

pub use executor::SyncExecutor;
pub use job::{PassSummary, SyncJob, SyncSummary};
pub use policy::CompletionPolicy;
pub use rate_limit::{RateLimitError, RateLimiter};
pub use reconcile::ThreadReconciler;

/// Sync errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A day could not be synced; later days were not attempted
    #[error("{flag} sync of {date} failed{}: {source}", channel_suffix(.channel))]
    DayFailed {
        /// Failed date
        date: NaiveDate,
        /// Failed pass
        flag: SyncFlag,
        /// Channel being fetched, if any
        channel: Option<String>,
        /// Underlying failure
        #[source]
        source: Box<SyncError>,
    },

    /// The threads pass found no messages shard for the date
    #[error("messages shard missing for {date}: {}", .path.display())]
    MissingShard {
        /// Date without a shard
        date: NaiveDate,
        /// Expected location
        path: PathBuf,
    },

    /// Shutdown requested
    #[error("sync cancelled")]
    Cancelled,

    /// Job parameters are inconsistent
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Remote API failure
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Shard or snapshot failure
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Checkpoint or lock failure
    #[error("resume error: {0}")]
    Resume(#[from] ResumeError),
}

impl SyncError {
    /// Whether the run stopped because of a shutdown request
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled | Self::Fetcher(FetcherError::Cancelled) => true,
            Self::DayFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

fn channel_suffix(channel: &Option<String>) -> String {
    channel
        .as_deref()
        .map(|id| format!(" in {id}"))
        .unwrap_or_default()
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
