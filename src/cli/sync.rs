//! Sync command implementation

use super::{Cli, CliError, OutputFormat};
use crate::calendar;
use crate::config::{ResolvedConfig, SyncConfig};
use crate::fetcher::retry::{RetryPolicy, RetryingApi};
use crate::fetcher::slack_http::{SlackHttpClient, SLACK_API_BASE_URL};
use crate::shutdown::SharedShutdown;
use crate::sync::config::{MAX_ATTEMPTS, RATE_LIMIT_WINDOW, REQUESTS_PER_WINDOW};
use crate::sync::{RateLimiter, SyncExecutor, SyncJob, SyncSummary};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

/// Sync command arguments
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Slack user or bot token
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub token: String,

    /// First date to sync (YYYY-MM-DD), overrides the config file
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// First date not synced (YYYY-MM-DD), default tomorrow
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Working days during which threads are re-checked
    #[arg(long)]
    pub threads_lookback: Option<u32>,

    /// Re-fetch days that are already complete
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Reuse the stored user and channel lists instead of listing them again
    #[arg(long, default_value_t = false)]
    pub skip_directory: bool,

    /// Slack Web API base URL
    #[arg(long, env = "SLACK_API_URL", default_value = SLACK_API_BASE_URL)]
    pub api_url: String,

    /// Maximum calls per request, first attempt included (range: 1-20)
    #[arg(long, default_value_t = MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: u32,

    /// Requests allowed per minute
    #[arg(long, default_value_t = REQUESTS_PER_WINDOW)]
    pub requests_per_minute: usize,

    /// Evaluate completion as of this date instead of today (YYYY-MM-DD)
    #[arg(long, hide = true)]
    pub today: Option<NaiveDate>,
}

impl SyncArgs {
    /// Settings after merging the config file and the flags
    pub fn resolve(&self, cli: &Cli) -> Result<ResolvedConfig, CliError> {
        let overrides = SyncConfig {
            storage_location: cli.storage_location.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            threads_lookback_working_days: self.threads_lookback,
        };
        let today = self.today.unwrap_or_else(calendar::today_utc);
        Ok(cli.file_config()?.merge(overrides).resolve(today)?)
    }

    /// Execute the sync
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.resolve(cli)?;
        if self.requests_per_minute == 0 {
            return Err(CliError::InvalidArgument(
                "requests-per-minute must be at least 1".to_string(),
            ));
        }

        info!(
            storage_location = %config.storage_location.display(),
            start_date = %config.start_date,
            end_date = %config.end_date,
            threads_lookback = config.threads_lookback_working_days,
            "Sync configured"
        );

        let client = SlackHttpClient::with_base_url(self.token.clone(), self.api_url.clone())?
            .with_rate_limiter(RateLimiter::new(self.requests_per_minute, RATE_LIMIT_WINDOW));
        let api = RetryingApi::new(client, RetryPolicy::with_max_attempts(self.max_attempts))
            .with_shutdown(shutdown.clone());

        let mut executor = SyncExecutor::open(
            api,
            config.storage_location.clone(),
            config.threads_lookback_working_days,
        )?
        .with_shutdown(shutdown);
        if let Some(today) = self.today {
            executor = executor.with_today(today);
        }

        let job = SyncJob::new(config.start_date, config.end_date)
            .with_force(self.force)
            .with_refresh_directory(!self.skip_directory);
        let summary = executor.run(&job).await?;

        match cli.output_format {
            OutputFormat::Json => output_json(&job, &summary),
            OutputFormat::Human => output_human(&job, &summary),
        }
        Ok(())
    }
}

fn output_json(job: &SyncJob, summary: &SyncSummary) {
    let output = serde_json::json!({
        "status": "completed",
        "start_date": job.start_date,
        "end_date": job.end_date,
        "messages": summary.messages,
        "threads": summary.threads,
    });
    println!("{output}");
}

fn output_human(job: &SyncJob, summary: &SyncSummary) {
    println!("Sync completed: {} .. {}", job.start_date, job.end_date);
    for (label, pass) in [("Messages", summary.messages), ("Threads", summary.threads)] {
        println!(
            "  {label}: {} fetched, {} skipped, {} frozen, {} records",
            pass.fetched, pass.skipped, pass.frozen, pass.events
        );
    }
}
