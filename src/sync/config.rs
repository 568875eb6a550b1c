//! Sync configuration constants

use std::time::Duration;

/// Total calls allowed per remote operation, first attempt included.
/// Ten calls with a 60 s base delay ride out Slack's tier-3 rate windows.
pub const MAX_ATTEMPTS: u32 = 10;

/// Delay before the first retry, in seconds.
pub const INITIAL_BACKOFF_SECS: u64 = 60;

/// Upper bound on any single backoff delay, in seconds (30 minutes).
pub const MAX_BACKOFF_SECS: u64 = 1800;

/// Page size requested from history, replies and list endpoints.
pub const PAGE_LIMIT: u32 = 200;

/// Client-side request budget per [`RATE_LIMIT_WINDOW`].
pub const REQUESTS_PER_WINDOW: usize = 50;

/// Rolling window of the client-side request budget.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Working days during which a day's threads are still re-checked.
pub const DEFAULT_THREADS_LOOKBACK_WORKING_DAYS: u32 = 2;
