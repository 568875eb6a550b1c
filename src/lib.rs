//! # Slack History Sync Library
//!
//! Incrementally mirrors a Slack workspace's history (channels, users,
//! messages and threaded replies) into a local store of dated JSON Lines
//! shards, so it can later be enriched and rendered into other formats.
//!
//! ## Features
//!
//! - **Day-by-day sync**: every calendar day is an independent unit of work
//! - **Checkpointing**: per-day completion flags make re-runs safe and cheap
//! - **Lookback window**: recent days are re-fetched until late replies settle
//! - **Backoff**: long exponential backoff for Slack's rate-limited endpoints
//! - **Atomic shards**: a reader never observes a half-written day
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use slack_history_sync::fetcher::retry::{RetryPolicy, RetryingApi};
//! use slack_history_sync::fetcher::slack_http::SlackHttpClient;
//! use slack_history_sync::sync::{SyncExecutor, SyncJob};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SlackHttpClient::new("xoxp-token")?;
//! let api = RetryingApi::new(client, RetryPolicy::default());
//!
//! let job = SyncJob::new(
//!     NaiveDate::from_ymd_opt(2020, 4, 9).unwrap(),
//!     NaiveDate::from_ymd_opt(2020, 4, 12).unwrap(),
//! );
//!
//! let mut executor = SyncExecutor::open(api, "./slack-archive", 2)?;
//! let summary = executor.run(&job).await?;
//! println!("{} message days fetched", summary.messages.fetched);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Remote API boundary, retrying client and pagination
//! - [`sync`] - Day driver, completion policy and thread reconciliation
//! - [`resume`] - Per-day checkpoint store and run lock
//! - [`output`] - Dated JSON Lines shards and store layout
//! - [`directory`] - User and channel lookups
//! - [`render`] - Enrichment and org-mode export
//! - [`config`] - TOML configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar helpers
pub mod calendar;

/// CLI command implementations
pub mod cli;

/// Configuration file loading
pub mod config;

/// User and channel directory lookups
pub mod directory;

/// Remote API access
pub mod fetcher;

/// Sync metrics
pub mod metrics;

/// Dated shard storage
pub mod output;

/// Enrichment and export rendering
pub mod render;

/// Checkpoint persistence
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Day-by-day synchronization engine
pub mod sync;

/// Event timestamp type
pub mod timestamp;

pub use timestamp::EventTimestamp;

/// A channel as listed by the workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRef {
    /// Channel id (e.g., "C012AB3CD")
    pub id: String,
    /// Channel name, absent for direct messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The token owner is a member of this channel
    #[serde(default)]
    pub is_member: bool,
    /// Direct message with a single user
    #[serde(default)]
    pub is_im: bool,
    /// Multi-party direct message
    #[serde(default)]
    pub is_mpim: bool,
    /// Counterpart user of a direct message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChannelRef {
    /// Whether the channel's history is mirrored
    pub fn is_eligible(&self) -> bool {
        self.is_member || self.is_im
    }
}

/// A workspace member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRef {
    /// User id (e.g., "U012AB3CD")
    pub id: String,
    /// Handle
    pub name: String,
    /// Full name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    /// Deactivated account
    #[serde(default)]
    pub deleted: bool,
    /// Bot user
    #[serde(default)]
    pub is_bot: bool,
}

/// Half-open query window `[oldest, latest)` over event timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    /// Lower bound
    pub oldest: EventTimestamp,
    /// Upper bound
    pub latest: EventTimestamp,
}

impl TimeWindow {
    /// Window between two instants
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            oldest: EventTimestamp::from_datetime(start),
            latest: EventTimestamp::from_datetime(end),
        }
    }

    /// Window covering one UTC calendar day
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = calendar::next_day(date)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        Self::between(start, end)
    }

    /// Same window with a new upper bound
    pub fn with_latest(&self, latest: EventTimestamp) -> Self {
        Self {
            oldest: self.oldest.clone(),
            latest,
        }
    }

    /// Whether no timestamp can satisfy the window
    pub fn is_empty(&self) -> bool {
        self.oldest >= self.latest
    }
}

/// Top-level message as persisted in the `raw_messages` shards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    /// Rich-text blocks, kept verbatim
    pub blocks: Vec<serde_json::Value>,
    /// Event timestamp
    #[serde(rename = "ts")]
    pub event_timestamp: EventTimestamp,
    /// Thread marker, equal to `ts` on thread roots
    #[serde(rename = "thread_ts", default)]
    pub thread_root_timestamp: Option<EventTimestamp>,
    /// Author id
    #[serde(rename = "user", default)]
    pub author_id: Option<String>,
    /// Channel the event was posted in
    #[serde(rename = "channel")]
    pub channel_id: String,
}

impl RawEvent {
    /// A thread root references its own timestamp as thread identifier
    pub fn is_thread_root(&self) -> bool {
        self.thread_root_timestamp.as_ref() == Some(&self.event_timestamp)
    }
}

/// Reply inside a thread, without channel and thread marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyEvent {
    /// Rich-text blocks, kept verbatim
    #[serde(default)]
    pub blocks: Vec<serde_json::Value>,
    /// Event timestamp
    #[serde(rename = "ts")]
    pub event_timestamp: EventTimestamp,
    /// Author id
    #[serde(rename = "user", default)]
    pub author_id: Option<String>,
}

/// A day's top-level event with its replies attached when it is a thread root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedDayRecord {
    /// The top-level event
    #[serde(flatten)]
    pub event: RawEvent,
    /// Replies in thread order, present exactly for thread roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Vec<ReplyEvent>>,
}

impl EnrichedDayRecord {
    /// Record without replies
    pub fn plain(event: RawEvent) -> Self {
        Self {
            event,
            thread: None,
        }
    }

    /// Number of replies attached
    pub fn reply_count(&self) -> usize {
        self.thread.as_ref().map_or(0, Vec::len)
    }
}
