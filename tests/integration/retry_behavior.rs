//! Backoff timing of the retrying client, on tokio's paused clock

use crate::support::{april, message, ts_at, MockSlack};
use slack_history_sync::fetcher::retry::{RetryPolicy, RetryingApi};
use slack_history_sync::fetcher::{ConversationApi, FetcherError};
use slack_history_sync::shutdown::ShutdownCoordinator;
use slack_history_sync::sync::{SyncError, SyncExecutor, SyncJob};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

fn rate_limited() -> FetcherError {
    FetcherError::RateLimited { retry_after: None }
}

fn retrying(slack: &Arc<MockSlack>) -> RetryingApi<Arc<MockSlack>> {
    RetryingApi::new(slack.clone(), RetryPolicy::default())
}

#[tokio::test(start_paused = true)]
async fn test_nine_failures_then_success_waits_out_the_full_ladder() {
    let slack = Arc::new(MockSlack::new());
    slack.fail_next(std::iter::repeat_with(rate_limited).take(9));

    let started = Instant::now();
    let users = retrying(&slack).list_users().await.unwrap();

    // 60 + 120 + 240 + 480 + 960 + 4 * 1800
    assert_eq!(started.elapsed().as_secs(), 9060);
    assert_eq!(users.len(), 2);
    assert_eq!(slack.count_calls("users"), 10);
}

#[tokio::test(start_paused = true)]
async fn test_ten_failures_exhaust_the_budget_without_a_final_wait() {
    let slack = Arc::new(MockSlack::new());
    slack.fail_next(std::iter::repeat_with(rate_limited).take(10));

    let started = Instant::now();
    let err = retrying(&slack).list_users().await.unwrap_err();

    assert_eq!(started.elapsed().as_secs(), 9060);
    match err {
        FetcherError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 10);
            assert!(matches!(*last, FetcherError::RateLimited { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_stretches_the_delay() {
    let slack = Arc::new(MockSlack::new());
    slack.fail_next([FetcherError::RateLimited {
        retry_after: Some(Duration::from_secs(300)),
    }]);

    let started = Instant::now();
    retrying(&slack).list_channels().await.unwrap();

    assert_eq!(started.elapsed().as_secs(), 300);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_errors_are_not_retried() {
    let slack = Arc::new(MockSlack::new());
    slack.fail_next([FetcherError::ApiError("invalid_auth".to_string())]);

    let started = Instant::now();
    let err = retrying(&slack).list_users().await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(slack.count_calls("users"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_a_backoff_wait() {
    let slack = Arc::new(MockSlack::new());
    slack.fail_next(std::iter::repeat_with(rate_limited).take(3));
    let shutdown = ShutdownCoordinator::shared();
    let api = retrying(&slack).with_shutdown(shutdown.clone());

    let stopper = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            shutdown.request_shutdown();
        }
    });

    let started = Instant::now();
    let err = api.list_users().await.unwrap_err();
    stopper.await.unwrap();

    assert!(matches!(err, FetcherError::Cancelled));
    // First wait (60 s) completes, the second (120 s) is cut at 90 s
    assert_eq!(started.elapsed().as_secs(), 90);
    assert_eq!(slack.count_calls("users"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sync_rides_out_transient_failures() {
    let dir = TempDir::new().unwrap();
    let slack = Arc::new(MockSlack::new());
    slack.post("C1", message(&ts_at(april(9), 9, 0, 0), "U1", "hello"));
    // users.list, then conversations.list, then the first history page
    slack.fail_next([
        rate_limited(),
        FetcherError::HttpError {
            status: 503,
            message: "unavailable".to_string(),
        },
        FetcherError::NetworkError("connection reset".to_string()),
    ]);

    let mut executor = SyncExecutor::open(retrying(&slack), dir.path(), 1)
        .unwrap()
        .with_today(april(14));
    let summary = executor
        .run(&SyncJob::new(april(9), april(10)))
        .await
        .unwrap();

    assert_eq!(summary.messages.events, 1);
    assert_eq!(summary.threads.frozen, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_the_day() {
    let dir = TempDir::new().unwrap();
    let slack = Arc::new(MockSlack::new());

    let mut executor = SyncExecutor::open(
        RetryingApi::new(slack.clone(), RetryPolicy::with_max_attempts(2)),
        dir.path(),
        1,
    )
    .unwrap()
    .with_today(april(14));
    executor.refresh_directory().await.unwrap();

    slack.fail_next(std::iter::repeat_with(rate_limited).take(2));
    let err = executor
        .run(&SyncJob::new(april(9), april(10)).with_refresh_directory(false))
        .await
        .unwrap_err();

    match err {
        SyncError::DayFailed { date, source, .. } => {
            assert_eq!(date, april(9));
            assert!(matches!(
                *source,
                SyncError::Fetcher(FetcherError::RetriesExhausted { attempts: 2, .. })
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}
