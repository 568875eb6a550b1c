//! Sync observability metrics
//!
//! Counters and histograms for Slack API traffic, retry behavior, the
//! client-side rate limiter and per-day sync outcomes.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for the scrape endpoint (enabled by `--metrics-addr`)
//! - Without an installed recorder every call is a no-op

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics initialization errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be installed
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "127.0.0.1:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!(
        "slack_requests_total",
        Unit::Count,
        "Total number of requests made to the Slack Web API"
    );
    describe_counter!(
        "slack_rate_limited_total",
        Unit::Count,
        "Total number of rate limit responses received"
    );
    describe_histogram!(
        "slack_request_duration_seconds",
        Unit::Seconds,
        "Slack API request duration in seconds"
    );
    describe_counter!(
        "slack_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "slack_retry_backoff_seconds",
        Unit::Seconds,
        "Backoff waited before a retry"
    );
    describe_counter!(
        "slack_retries_exhausted_total",
        Unit::Count,
        "Operations abandoned after the last allowed attempt"
    );
    describe_histogram!(
        "rate_limit_queue_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a request permit"
    );
    describe_gauge!(
        "rate_limit_permits_available",
        Unit::Count,
        "Currently available request permits"
    );
    describe_counter!(
        "sync_days_completed_total",
        Unit::Count,
        "Days fetched and written, per pass"
    );
    describe_counter!(
        "sync_days_skipped_total",
        Unit::Count,
        "Days skipped because they were already complete, per pass"
    );
    describe_counter!(
        "sync_days_failed_total",
        Unit::Count,
        "Days whose sync failed, per pass"
    );
    describe_counter!(
        "sync_events_written_total",
        Unit::Count,
        "Records written to day shards, per pass"
    );

    *initialized = true;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one Slack API request
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start recording a new request
    pub fn start(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            "Slack request started"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record an HTTP response
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "slack_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!(
            "slack_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            self.record_rate_limited();
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis(),
            "Slack request completed"
        );
    }

    /// Record a rate limit signalled by status or by `error: ratelimited`
    pub fn record_rate_limited(&self) {
        counter!(
            "slack_rate_limited_total",
            "endpoint" => self.endpoint.clone(),
        )
        .increment(1);

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            "Rate limited by Slack"
        );
    }

    /// Record a request that produced no response
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "slack_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
        )
        .increment(1);

        histogram!(
            "slack_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a backoff wait before retrying `operation`
pub fn record_retry_backoff(operation: &str, duration: Duration, attempt: u32) {
    counter!(
        "slack_retries_total",
        "operation" => operation.to_string(),
    )
    .increment(1);

    histogram!(
        "slack_retry_backoff_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());

    debug!(
        operation,
        attempt,
        backoff_secs = duration.as_secs(),
        "Retry backoff recorded"
    );
}

/// Record an operation abandoned after its last attempt
pub fn record_retries_exhausted(operation: &str) {
    counter!(
        "slack_retries_exhausted_total",
        "operation" => operation.to_string(),
    )
    .increment(1);
}

/// Rate limiter metrics helper
#[derive(Default)]
pub struct RateLimiterMetrics {
    start_time: Option<Instant>,
}

impl RateLimiterMetrics {
    /// Create a new rate limiter metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Start measuring queue wait time
    pub fn start_acquire(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Record successful permit acquisition
    pub fn record_acquired(&mut self, available: usize) {
        if let Some(start) = self.start_time.take() {
            let wait_duration = start.elapsed();
            histogram!("rate_limit_queue_wait_seconds").record(wait_duration.as_secs_f64());

            if wait_duration.as_millis() > 100 {
                debug!(
                    wait_ms = wait_duration.as_millis(),
                    "Request permit acquired after wait"
                );
            }
        }
        gauge!("rate_limit_permits_available").set(available as f64);
    }
}

/// Outcome tracking for one day of one pass
pub struct DayMetrics {
    pass: &'static str,
    start_time: Instant,
}

impl DayMetrics {
    /// Start tracking a day
    pub fn start(pass: &'static str) -> Self {
        Self {
            pass,
            start_time: Instant::now(),
        }
    }

    /// Record a written day
    pub fn record_success(&self, events: usize) {
        counter!("sync_days_completed_total", "pass" => self.pass).increment(1);
        counter!("sync_events_written_total", "pass" => self.pass).increment(events as u64);
        debug!(
            pass = self.pass,
            events,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Day metrics recorded"
        );
    }

    /// Record a failed day
    pub fn record_failure(&self) {
        counter!("sync_days_failed_total", "pass" => self.pass).increment(1);
    }
}

/// Record a day skipped because it was already complete
pub fn record_day_skipped(pass: &'static str) {
    counter!("sync_days_skipped_total", "pass" => pass).increment(1);
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
