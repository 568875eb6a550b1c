//! Client-side request rate limiting
//!
//! Keeps the request rate under Slack's per-method tiers so that the
//! server-side 429 path, with its minute-long backoff, stays the exception.

use crate::metrics::RateLimiterMetrics;
use crate::sync::config::{RATE_LIMIT_WINDOW, REQUESTS_PER_WINDOW};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// Sliding-window request limiter
///
/// Every acquired permit is held for the full window, so at most
/// `max_requests` requests start within any window-long interval.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_requests: usize,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(REQUESTS_PER_WINDOW, RATE_LIMIT_WINDOW)
    }
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_requests)),
            max_requests,
            window,
        }
    }

    /// Requests allowed per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a request slot
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let mut metrics = RateLimiterMetrics::new();
        metrics.start_acquire();

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RateLimitError::AcquireError(e.to_string()))?;

        metrics.record_acquired(self.semaphore.available_permits());

        // Hold the permit for the window, then release it.
        let window = self.window;
        tokio::spawn(async move {
            sleep(window).await;
            drop(permit);
        });

        Ok(())
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Failed to acquire permits
    #[error("failed to acquire rate limit permit: {0}")]
    AcquireError(String),
}
