//! Sync executor
//!
//! Drives a [`SyncJob`] over a store: directory refresh, then the messages
//! pass, then the threads pass. Dates ascend within a pass and channels are
//! fetched one after the other. The first failure stops the run; everything
//! committed before it stays valid.

use super::job::{PassSummary, SyncJob, SyncSummary};
use super::policy::CompletionPolicy;
use super::reconcile::ThreadReconciler;
use super::{SyncError, SyncResult};
use crate::calendar;
use crate::directory::{Channels, Users};
use crate::fetcher::pagination::PaginationHelper;
use crate::fetcher::{ConversationApi, RemoteMessage};
use crate::metrics::{self, DayMetrics};
use crate::output::{jsonl, OutputError, ShardKind, StoreLayout};
use crate::resume::{CheckpointStore, FlagState, SyncFlag, SyncLock};
use crate::shutdown::SharedShutdown;
use crate::{RawEvent, TimeWindow};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, Instrument};

/// Day-by-day sync over one store
pub struct SyncExecutor<A> {
    api: A,
    layout: StoreLayout,
    checkpoints: CheckpointStore,
    threads_lookback: u32,
    today: NaiveDate,
    shutdown: Option<SharedShutdown>,
}

impl<A: ConversationApi> SyncExecutor<A> {
    /// Open the store at `root`, creating its directories and loading its status
    pub fn open(api: A, root: impl Into<PathBuf>, threads_lookback: u32) -> SyncResult<Self> {
        let layout = StoreLayout::new(root);
        layout.ensure_dirs()?;
        let checkpoints = CheckpointStore::load(layout.status_path())?;

        Ok(Self {
            api,
            layout,
            checkpoints,
            threads_lookback,
            today: calendar::today_utc(),
            shutdown: None,
        })
    }

    /// Evaluate the completion policy against `today` instead of the clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Store paths
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Current checkpoint state
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Freeze rules of this executor
    pub fn policy(&self) -> CompletionPolicy {
        CompletionPolicy::new(self.today, self.threads_lookback)
    }

    /// List users and channels and replace the store's snapshots
    pub async fn refresh_directory(&self) -> SyncResult<(Users, Channels)> {
        let users = self.api.list_users().await?;
        let channels = self.api.list_channels().await?;

        jsonl::write_day(&self.layout.users_path(), &users)?;
        jsonl::write_day(&self.layout.channels_path(), &channels)?;

        let users = Users::new(users);
        let channels = Channels::new(channels);
        info!(
            users = users.len(),
            channels = channels.len(),
            eligible = channels.eligible().count(),
            "Directory refreshed"
        );
        Ok((users, channels))
    }

    /// Run both passes of `job`
    ///
    /// Fails with [`crate::resume::ResumeError::AlreadyRunning`] when another
    /// run holds the store.
    pub async fn run(&mut self, job: &SyncJob) -> SyncResult<SyncSummary> {
        job.validate().map_err(SyncError::InvalidJob)?;

        let mut lock = SyncLock::open(&self.layout.lock_path())?;
        let _guard = lock.try_acquire()?;

        let span = tracing::info_span!(
            "sync",
            start_date = %job.start_date,
            end_date = %job.end_date,
            force = job.force
        );
        self.run_locked(job).instrument(span).await
    }

    async fn run_locked(&mut self, job: &SyncJob) -> SyncResult<SyncSummary> {
        let policy = self.policy();
        info!(
            today = %policy.today(),
            threads_boundary = %policy.threads_boundary(),
            "Starting sync"
        );

        let channels = if job.refresh_directory {
            self.refresh_directory().await?.1
        } else {
            Channels::load(&self.layout)?
        };

        let messages = self
            .run_pass(job, SyncFlag::Messages, &channels, &policy)
            .await?;
        let threads = self
            .run_pass(job, SyncFlag::Threads, &channels, &policy)
            .await?;

        let summary = SyncSummary { messages, threads };
        info!(
            messages_fetched = summary.messages.fetched,
            messages_skipped = summary.messages.skipped,
            threads_fetched = summary.threads.fetched,
            threads_skipped = summary.threads.skipped,
            "Sync completed"
        );
        Ok(summary)
    }

    async fn run_pass(
        &mut self,
        job: &SyncJob,
        flag: SyncFlag,
        channels: &Channels,
        policy: &CompletionPolicy,
    ) -> SyncResult<PassSummary> {
        let mut summary = PassSummary::default();

        for date in job.dates() {
            self.check_shutdown()?;

            let state = self.checkpoints.entry(date).state(flag);
            if state == FlagState::Complete && !job.force {
                info!(%date, %flag, "Day already complete, skipping");
                metrics::record_day_skipped(flag.as_str());
                summary.skipped += 1;
                continue;
            }

            let state = state.begin();
            let day_metrics = DayMetrics::start(flag.as_str());
            info!(%date, %flag, "Fetching day");

            self.checkpoints
                .record_attempt(date)
                .map_err(|e| day_failed(date, flag, None, e))?;

            let written = match flag {
                SyncFlag::Messages => self.sync_messages_day(date, channels).await,
                SyncFlag::Threads => self.sync_threads_day(date).await,
            };
            let written = match written {
                Ok(written) => written,
                Err(e) => {
                    day_metrics.record_failure();
                    return Err(e);
                }
            };

            let was_complete = self.checkpoints.is_complete(date, flag);
            if state.finish(policy.may_freeze(date, flag)).persisted() && !was_complete {
                self.checkpoints
                    .mark_complete(date, flag)
                    .map_err(|e| day_failed(date, flag, None, e))?;
                summary.frozen += 1;
            }

            day_metrics.record_success(written);
            summary.fetched += 1;
            summary.events += written as u64;
            info!(
                %date,
                %flag,
                events = written,
                complete = self.checkpoints.is_complete(date, flag),
                "Day synced"
            );
        }

        Ok(summary)
    }

    async fn sync_messages_day(&self, date: NaiveDate, channels: &Channels) -> SyncResult<usize> {
        let flag = SyncFlag::Messages;
        let window = TimeWindow::for_date(date);
        let mut events: Vec<RawEvent> = Vec::new();

        for channel in channels.eligible() {
            let messages = PaginationHelper::fetch_window(&self.api, &channel.id, window.clone())
                .await
                .map_err(|e| day_failed(date, flag, Some(channel.id.as_str()), e))?;
            let before = events.len();
            events.extend(
                messages
                    .into_iter()
                    .filter(RemoteMessage::is_storable)
                    .map(|message| message.into_raw_event(&channel.id)),
            );
            debug!(%date, channel = %channel.id, events = events.len() - before, "Channel fetched");
        }

        let path = self.layout.shard_path(ShardKind::RawMessages, date);
        jsonl::write_day(&path, &events).map_err(|e| day_failed(date, flag, None, e))
    }

    async fn sync_threads_day(&self, date: NaiveDate) -> SyncResult<usize> {
        let flag = SyncFlag::Threads;
        let messages_path = self.layout.shard_path(ShardKind::RawMessages, date);
        let events: Vec<RawEvent> = match jsonl::read_day(&messages_path) {
            Ok(events) => events,
            Err(OutputError::ShardNotFound(path)) => {
                return Err(day_failed(
                    date,
                    flag,
                    None,
                    SyncError::MissingShard { date, path },
                ))
            }
            Err(e) => return Err(day_failed(date, flag, None, e)),
        };

        let channel_ids: BTreeSet<String> =
            events.into_iter().map(|event| event.channel_id).collect();
        let window = TimeWindow::for_date(date);
        let mut records = Vec::new();

        for channel_id in &channel_ids {
            let day_events = PaginationHelper::fetch_window(&self.api, channel_id, window.clone())
                .await
                .map_err(|e| day_failed(date, flag, Some(channel_id.as_str()), e))?;
            let reconciled = ThreadReconciler::reconcile(&self.api, channel_id, day_events)
                .await
                .map_err(|e| day_failed(date, flag, Some(channel_id.as_str()), e))?;
            debug!(%date, channel = %channel_id, records = reconciled.len(), "Channel reconciled");
            records.extend(reconciled);
        }

        let path = self.layout.shard_path(ShardKind::RawThreads, date);
        jsonl::write_day(&path, &records).map_err(|e| day_failed(date, flag, None, e))
    }

    fn check_shutdown(&self) -> SyncResult<()> {
        let requested = self
            .shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false);
        if requested {
            info!("Shutdown requested, stopping before next day");
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

fn day_failed(
    date: NaiveDate,
    flag: SyncFlag,
    channel: Option<&str>,
    source: impl Into<SyncError>,
) -> SyncError {
    SyncError::DayFailed {
        date,
        flag,
        channel: channel.map(str::to_string),
        source: Box::new(source.into()),
    }
}
