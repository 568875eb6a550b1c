//! When a synced day may become final
//!
//! Messages of a past day no longer change. Threads keep receiving replies
//! for a while, so a day's threads are only frozen once the day lies a
//! number of working days back.

use crate::calendar::working_days_before;
use crate::resume::SyncFlag;
use chrono::NaiveDate;

/// Freeze rules relative to a fixed "today"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPolicy {
    today: NaiveDate,
    threads_boundary: NaiveDate,
}

impl CompletionPolicy {
    /// Policy for `today` with a threads lookback of `lookback_working_days`
    pub fn new(today: NaiveDate, lookback_working_days: u32) -> Self {
        Self {
            today,
            threads_boundary: working_days_before(today, lookback_working_days),
        }
    }

    /// The date the policy is evaluated against
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// First date whose threads are still re-checked
    pub fn threads_boundary(&self) -> NaiveDate {
        self.threads_boundary
    }

    /// Whether `flag` of `date` may be persisted as complete
    pub fn may_freeze(&self, date: NaiveDate, flag: SyncFlag) -> bool {
        match flag {
            SyncFlag::Messages => date < self.today,
            SyncFlag::Threads => date < self.threads_boundary,
        }
    }
}
