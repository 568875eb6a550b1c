//! Backoff-retrying wrapper around any [`ConversationApi`]
//!
//! Slack's history endpoints are tier-3 rate limited, so retries wait
//! minutes rather than seconds: `min(60 s * 2^n, 30 min)` before retry `n`,
//! stretched to the server's `Retry-After` when that is longer.

use crate::fetcher::retry_formatter::{format_recovery, RetryContext};
use crate::fetcher::{ConversationApi, FetcherError, FetcherResult, MessagePage};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::sync::config::{INITIAL_BACKOFF_SECS, MAX_ATTEMPTS, MAX_BACKOFF_SECS};
use crate::{ChannelRef, EventTimestamp, TimeWindow, UserRef};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry limits and delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, first attempt included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Cap on any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: Duration::from_secs(INITIAL_BACKOFF_SECS),
            max_backoff: Duration::from_secs(MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Default delays with a different attempt budget
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before retry `retry` (0-based)
    ///
    /// ```
    /// use slack_history_sync::fetcher::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(0, None), Duration::from_secs(60));
    /// assert_eq!(policy.delay_for(1, Some(Duration::from_secs(300))), Duration::from_secs(300));
    /// assert_eq!(policy.delay_for(12, None), Duration::from_secs(1800));
    /// ```
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = 2u32
            .checked_pow(retry)
            .and_then(|factor| self.initial_backoff.checked_mul(factor))
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);

        match retry_after {
            Some(requested) => backoff.max(requested).min(self.max_backoff),
            None => backoff,
        }
    }
}

/// [`ConversationApi`] that retries transient failures of an inner API
pub struct RetryingApi<A> {
    inner: A,
    policy: RetryPolicy,
    shutdown: Option<SharedShutdown>,
}

impl<A: ConversationApi> RetryingApi<A> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            shutdown: None,
        }
    }

    /// Abort backoff waits once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Wrapped API
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn call<T, F, Fut>(&self, operation: &str, subject: &str, mut op: F) -> FetcherResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = FetcherResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            operation,
                            subject,
                            attempt,
                            "{}",
                            format_recovery(attempt, self.policy.max_attempts, operation, subject)
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= self.policy.max_attempts {
                let ctx = RetryContext::new(
                    attempt,
                    self.policy.max_attempts,
                    &err,
                    Duration::ZERO,
                    operation,
                    subject,
                );
                error!(operation, subject, attempt, "{}", ctx.format_failure());
                metrics::record_retries_exhausted(operation);
                return Err(FetcherError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_for(attempt - 1, err.retry_after());
            let ctx = RetryContext::new(
                attempt,
                self.policy.max_attempts,
                &err,
                delay,
                operation,
                subject,
            );
            warn!(
                operation,
                subject,
                attempt,
                delay_secs = delay.as_secs(),
                error = %err,
                "{}",
                ctx.format_retry()
            );
            metrics::record_retry_backoff(operation, delay, attempt);

            self.wait(delay).await?;
        }
    }

    async fn wait(&self, delay: Duration) -> FetcherResult<()> {
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    _ = shutdown.wait_for_shutdown() => Err(FetcherError::Cancelled),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<A: ConversationApi> ConversationApi for RetryingApi<A> {
    async fn list_channels(&self) -> FetcherResult<Vec<ChannelRef>> {
        self.call("conversations.list", "", || self.inner.list_channels())
            .await
    }

    async fn list_users(&self) -> FetcherResult<Vec<UserRef>> {
        self.call("users.list", "", || self.inner.list_users()).await
    }

    async fn fetch_history_page(
        &self,
        channel_id: &str,
        window: &TimeWindow,
    ) -> FetcherResult<MessagePage> {
        self.call("conversations.history", channel_id, || {
            self.inner.fetch_history_page(channel_id, window)
        })
        .await
    }

    async fn fetch_thread_page(
        &self,
        channel_id: &str,
        thread_root: &EventTimestamp,
        oldest: &EventTimestamp,
    ) -> FetcherResult<MessagePage> {
        let subject = format!("{channel_id}/{thread_root}");
        self.call("conversations.replies", &subject, || {
            self.inner.fetch_thread_page(channel_id, thread_root, oldest)
        })
        .await
    }
}
