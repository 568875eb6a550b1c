//! Retry message formatting for the backoff loop
//!
//! Keeps retry, recovery and give-up log lines consistent across every
//! remote operation, and attaches remediation hints to final failures.

use crate::fetcher::FetcherError;
use std::time::Duration;

/// Classification of retry errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection reset, DNS failure and similar
    NetworkGeneric,
    /// HTTP 429 or Slack `ratelimited`
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// Slack reported a transient server-side failure
    ServiceError,
    /// Token rejected
    AuthFailed,
    /// Other 4xx
    ClientError(u16),
    /// Any other Slack error code
    ApiError,
    /// Unparseable body or non-converging pagination
    Protocol,
}

impl RetryErrorType {
    /// Classify a fetcher error
    pub fn classify(error: &FetcherError) -> Self {
        match error {
            FetcherError::RateLimited { .. } => Self::RateLimit,
            FetcherError::HttpError { status: 429, .. } => Self::RateLimit,
            _ if error.is_auth() => Self::AuthFailed,
            FetcherError::HttpError { status, .. } if *status >= 500 => Self::ServerError(*status),
            FetcherError::HttpError { status, .. } => Self::ClientError(*status),
            FetcherError::Timeout(_) => Self::NetworkTimeout,
            FetcherError::NetworkError(_) => Self::NetworkGeneric,
            FetcherError::ApiError(code) if code == "ratelimited" => Self::RateLimit,
            FetcherError::ApiError(_) if error.is_retryable() => Self::ServiceError,
            FetcherError::ApiError(_) => Self::ApiError,
            FetcherError::RetriesExhausted { last, .. } => Self::classify(last),
            FetcherError::ParseError(_)
            | FetcherError::MalformedPagination(_)
            | FetcherError::Cancelled => Self::Protocol,
        }
    }

    /// Short description used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkGeneric => "network error",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::ServiceError => "Slack service error",
            Self::AuthFailed => "authentication failed",
            Self::ClientError(code) => match code {
                404 => "resource not found",
                _ => "client error",
            },
            Self::ApiError => "API error",
            Self::Protocol => "unexpected response",
        }
    }

    /// Suggested remediation presented after failures.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout | Self::NetworkGeneric => {
                "Check your network connection and try again"
            }
            Self::RateLimit => "Another client may share this token's quota; try again later",
            Self::ServerError(_) | Self::ServiceError => {
                "Slack may be experiencing issues, see https://status.slack.com"
            }
            Self::AuthFailed => "Verify SLACK_TOKEN is valid and has the required scopes",
            Self::ClientError(_) | Self::ApiError => {
                "Check that the token can read the channel being synced"
            }
            Self::Protocol => "Re-run with RUST_LOG=slack_history_sync=debug and report the response",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered the retry
    pub error_type: RetryErrorType,
    /// Backoff until the next attempt
    pub backoff_duration: Duration,
    /// Remote operation (e.g., "conversations.history")
    pub operation: String,
    /// What the operation was about (channel, thread)
    pub target: String,
    /// Error message of the failed attempt
    pub error_message: String,
}

impl RetryContext {
    /// Context for a failed attempt
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error: &FetcherError,
        backoff_duration: Duration,
        operation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type: RetryErrorType::classify(error),
            backoff_duration,
            operation: operation.into(),
            target: target.into(),
            error_message: error.to_string(),
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.0} seconds...",
            self.attempt + 1,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64()
        );
        append_target(&mut message, &self.operation, &self.target);
        message
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let target = if self.target.is_empty() {
            "unknown"
        } else {
            &self.target
        };

        let mut lines = vec![
            format!("[FAILED] {} failed after {} attempts", self.operation, self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Target: {target}"),
            "  Suggestions:".to_string(),
        ];
        lines.extend(
            self.format_suggestions()
                .into_iter()
                .map(|suggestion| format!("    - {suggestion}")),
        );
        lines.join("\n")
    }

    /// Suggestions tailored to the current context.
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error_type.suggestion().to_string()];
        if self.attempt >= self.max_attempts {
            suggestions.push(
                "Completed days are checkpointed; re-running resumes from the failed day"
                    .to_string(),
            );
        }
        suggestions
    }
}

/// Format success message when a retried operation eventually works.
pub fn format_recovery(attempt: u32, max_attempts: u32, operation: &str, target: &str) -> String {
    let mut message = format!("Attempt {attempt}/{max_attempts} succeeded - resuming sync");
    append_target(&mut message, operation, target);
    message
}

fn append_target(buffer: &mut String, operation: &str, target: &str) {
    buffer.push_str(" (");
    buffer.push_str(operation);
    if !target.is_empty() {
        buffer.push(' ');
        buffer.push_str(target);
    }
    buffer.push(')');
}
