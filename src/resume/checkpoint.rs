//! Per-day completion flags
//!
//! A date has one flag per sync pass. Flags only ever move from `false` to
//! `true`; a missing entry reads as both flags `false`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sync pass a flag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFlag {
    /// Top-level messages of the day
    Messages,
    /// Thread replies of the day's top-level messages
    Threads,
}

impl SyncFlag {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Threads => "threads",
        }
    }
}

impl fmt::Display for SyncFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted completion state of one date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// The day's top-level messages are final
    #[serde(default)]
    pub messages_complete: bool,
    /// The day's threads are final
    #[serde(default)]
    pub threads_complete: bool,
}

impl CheckpointEntry {
    /// Whether `flag` is set
    pub fn is_complete(&self, flag: SyncFlag) -> bool {
        match flag {
            SyncFlag::Messages => self.messages_complete,
            SyncFlag::Threads => self.threads_complete,
        }
    }

    /// Set `flag`; there is no way back
    pub fn mark_complete(&mut self, flag: SyncFlag) {
        match flag {
            SyncFlag::Messages => self.messages_complete = true,
            SyncFlag::Threads => self.threads_complete = true,
        }
    }

    /// In-memory state of `flag` at the start of a run
    pub fn state(&self, flag: SyncFlag) -> FlagState {
        if self.is_complete(flag) {
            FlagState::Complete
        } else {
            FlagState::Pending
        }
    }
}

/// Lifecycle of one flag during a run
///
/// `Fetching` only exists in memory; a crash while fetching leaves the
/// persisted flag `false`, which reads back as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    /// Not yet final
    Pending,
    /// Being fetched in this run
    Fetching,
    /// Final; never re-fetched without `--force`
    Complete,
}

impl FlagState {
    /// Start fetching
    pub fn begin(self) -> Self {
        match self {
            Self::Pending | Self::Fetching => Self::Fetching,
            // Forced re-fetch keeps the flag.
            Self::Complete => Self::Complete,
        }
    }

    /// Finish fetching; `freeze` tells whether the day may become final
    pub fn finish(self, freeze: bool) -> Self {
        match self {
            Self::Complete => Self::Complete,
            _ if freeze => Self::Complete,
            _ => Self::Pending,
        }
    }

    /// Value written to the status file
    pub fn persisted(self) -> bool {
        self == Self::Complete
    }
}
