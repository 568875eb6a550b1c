//! Sync run parameters and outcome

use crate::calendar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One sync run over `[start_date, end_date)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    /// First date synced
    pub start_date: NaiveDate,
    /// First date not synced
    pub end_date: NaiveDate,
    /// Re-fetch days already frozen; flags are never cleared
    #[serde(default)]
    pub force: bool,
    /// List users and channels before the passes
    #[serde(default = "default_refresh_directory")]
    pub refresh_directory: bool,
}

fn default_refresh_directory() -> bool {
    true
}

impl SyncJob {
    /// Job over `[start_date, end_date)` with directory refresh and no force
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            force: false,
            refresh_directory: true,
        }
    }

    /// Toggle forced re-fetch
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Toggle the directory refresh
    pub fn with_refresh_directory(mut self, refresh: bool) -> Self {
        self.refresh_directory = refresh;
        self
    }

    /// Dates of the job in ascending order
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        calendar::date_range(self.start_date, self.end_date)
    }

    /// Validate job parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err(format!(
                "End date ({}) must not be before start date ({})",
                self.end_date, self.start_date
            ));
        }
        Ok(())
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Days fetched and written
    pub fetched: u32,
    /// Days skipped because they were already complete
    pub skipped: u32,
    /// Days newly frozen by this run
    pub frozen: u32,
    /// Records written across all fetched days
    pub events: u64,
}

/// Outcome of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Messages pass
    pub messages: PassSummary,
    /// Threads pass
    pub threads: PassSummary,
}
