//! Fatal failures, resumption and run exclusion

use crate::support::{april, message, ts_at, MockSlack};
use slack_history_sync::fetcher::FetcherError;
use slack_history_sync::output::ShardKind;
use slack_history_sync::resume::{CheckpointStore, ResumeError, SyncFlag, SyncLock};
use slack_history_sync::shutdown::ShutdownCoordinator;
use slack_history_sync::sync::{SyncError, SyncExecutor, SyncJob};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn workspace() -> Arc<MockSlack> {
    let slack = MockSlack::new();
    for day in [9, 10, 11] {
        slack.post("C1", message(&ts_at(april(day), 9, 0, 0), "U1", "morning"));
    }
    Arc::new(slack)
}

fn open(slack: &Arc<MockSlack>, dir: &Path) -> SyncExecutor<Arc<MockSlack>> {
    SyncExecutor::open(slack.clone(), dir, 1)
        .unwrap()
        .with_today(april(14))
}

fn job() -> SyncJob {
    SyncJob::new(april(9), april(12))
}

fn shard_exists(dir: &Path, kind: ShardKind, day: u32) -> bool {
    dir.join(kind.dir_name())
        .join(format!("2020-04-{day:02}.{}", kind.extension()))
        .exists()
}

#[tokio::test]
async fn test_failure_stops_the_run_at_the_failing_date() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();
    slack.break_day("C1", april(10));

    let err = open(&slack, dir.path()).run(&job()).await.unwrap_err();
    match err {
        SyncError::DayFailed {
            date,
            flag,
            channel,
            source,
        } => {
            assert_eq!(date, april(10));
            assert_eq!(flag, SyncFlag::Messages);
            assert_eq!(channel.as_deref(), Some("C1"));
            assert!(matches!(*source, SyncError::Fetcher(FetcherError::ApiError(_))));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Days before the failure are committed, nothing after it was attempted
    let store = CheckpointStore::load(dir.path().join("status.json")).unwrap();
    assert!(store.is_complete(april(9), SyncFlag::Messages));
    assert!(!store.is_complete(april(10), SyncFlag::Messages));
    assert!(shard_exists(dir.path(), ShardKind::RawMessages, 9));
    assert!(!shard_exists(dir.path(), ShardKind::RawMessages, 10));
    assert!(!shard_exists(dir.path(), ShardKind::RawMessages, 11));
    assert!(!shard_exists(dir.path(), ShardKind::RawThreads, 9));
    assert_eq!(slack.count_calls("replies"), 0);
}

#[tokio::test]
async fn test_rerun_resumes_after_the_failure() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();
    slack.break_day("C1", april(10));
    open(&slack, dir.path()).run(&job()).await.unwrap_err();

    slack.heal();
    let summary = open(&slack, dir.path()).run(&job()).await.unwrap();

    assert_eq!(summary.messages.skipped, 1);
    assert_eq!(summary.messages.fetched, 2);
    assert_eq!(summary.threads.fetched, 3);

    let store = CheckpointStore::load(dir.path().join("status.json")).unwrap();
    for day in [9, 10, 11] {
        assert!(store.is_complete(april(day), SyncFlag::Messages), "day {day}");
        assert!(store.is_complete(april(day), SyncFlag::Threads), "day {day}");
    }
}

#[tokio::test]
async fn test_threads_pass_requires_the_messages_shard() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();

    // Messages freeze everywhere, threads only before Friday
    SyncExecutor::open(slack.clone(), dir.path(), 1)
        .unwrap()
        .with_today(april(11))
        .run(&job())
        .await
        .unwrap();
    std::fs::remove_file(dir.path().join("raw_messages/2020-04-10.jsonl")).unwrap();

    let err = SyncExecutor::open(slack.clone(), dir.path(), 1)
        .unwrap()
        .with_today(april(11))
        .run(&job())
        .await
        .unwrap_err();

    match err {
        SyncError::DayFailed {
            date, flag, source, ..
        } => {
            assert_eq!(date, april(10));
            assert_eq!(flag, SyncFlag::Threads);
            assert!(matches!(*source, SyncError::MissingShard { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_second_run_on_a_locked_store_is_rejected() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();
    let mut executor = open(&slack, dir.path());

    let mut lock = SyncLock::open(&executor.layout().lock_path()).unwrap();
    let _guard = lock.try_acquire().unwrap();

    let err = executor.run(&job()).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Resume(ResumeError::AlreadyRunning(_))
    ));
    assert!(slack.calls().is_empty());
}

#[tokio::test]
async fn test_lock_is_released_after_a_run() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();
    let mut executor = open(&slack, dir.path());
    executor.run(&job()).await.unwrap();

    let mut lock = SyncLock::open(&executor.layout().lock_path()).unwrap();
    assert!(lock.try_acquire().is_ok());
}

#[tokio::test]
async fn test_shutdown_stops_before_the_first_day() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let err = open(&slack, dir.path())
        .with_shutdown(shutdown)
        .run(&job())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(slack.count_calls("history"), 0);
    assert!(!shard_exists(dir.path(), ShardKind::RawMessages, 9));
}

#[tokio::test]
async fn test_reversed_range_is_rejected_before_any_request() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();

    let err = open(&slack, dir.path())
        .run(&SyncJob::new(april(11), april(9)))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::InvalidJob(_)));
    assert!(slack.calls().is_empty());
}

#[tokio::test]
async fn test_skipping_the_directory_needs_a_snapshot() {
    let dir = TempDir::new().unwrap();
    let slack = workspace();

    let err = open(&slack, dir.path())
        .run(&job().with_refresh_directory(false))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Output(_)));

    // Once a snapshot exists the directory listing is not repeated
    open(&slack, dir.path()).run(&job()).await.unwrap();
    slack.clear_calls();
    open(&slack, dir.path())
        .run(&job().with_refresh_directory(false).with_force(true))
        .await
        .unwrap();
    assert_eq!(slack.count_calls("users"), 0);
    assert_eq!(slack.count_calls("channels"), 0);
}
