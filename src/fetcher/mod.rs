//! Remote conversation API access
//!
//! [`ConversationApi`] is the boundary between the sync engine and the
//! remote service. [`slack_http::SlackHttpClient`] implements it over HTTP,
//! [`retry::RetryingApi`] wraps any implementation with backoff, and
//! [`pagination::PaginationHelper`] turns single pages into complete windows.

use crate::{ChannelRef, EventTimestamp, RawEvent, ReplyEvent, TimeWindow, UserRef};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub mod pagination;
pub mod retry;
pub mod retry_formatter;
pub mod slack_http;

/// Slack error codes worth another attempt
const TRANSIENT_API_ERRORS: &[&str] = &[
    "ratelimited",
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

/// Slack error codes caused by the token
const AUTH_API_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "token_revoked",
    "token_expired",
    "account_inactive",
];

/// Message subtype of integrations posting as bots
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    HttpError {
        /// Status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Connection or DNS failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Server asked the client to slow down
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Server supplied `Retry-After`
        retry_after: Option<Duration>,
    },

    /// `ok: false` response carrying a Slack error code
    #[error("API error: {0}")]
    ApiError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// Pagination did not converge
    #[error("malformed pagination: {0}")]
    MalformedPagination(String),

    /// Every allowed attempt failed
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of calls made
        attempts: u32,
        /// Error of the final call
        last: Box<FetcherError>,
    },

    /// Shutdown requested while waiting to retry
    #[error("cancelled by shutdown request")]
    Cancelled,
}

impl FetcherError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::NetworkError(_) | Self::Timeout(_) => true,
            Self::HttpError { status, .. } => *status >= 500,
            Self::ApiError(code) => TRANSIENT_API_ERRORS.contains(&code.as_str()),
            _ => false,
        }
    }

    /// Whether the failure is caused by an invalid or revoked token
    pub fn is_auth(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => matches!(status, 401 | 403),
            Self::ApiError(code) => AUTH_API_ERRORS.contains(&code.as_str()),
            Self::RetriesExhausted { last, .. } => last.is_auth(),
            _ => false,
        }
    }

    /// Server supplied delay, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Message as returned by `conversations.history` and `conversations.replies`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteMessage {
    /// Event timestamp
    pub ts: EventTimestamp,
    /// Thread marker
    #[serde(default)]
    pub thread_ts: Option<EventTimestamp>,
    /// Author id
    #[serde(default)]
    pub user: Option<String>,
    /// Message subtype (e.g., "bot_message", "channel_join")
    #[serde(default)]
    pub subtype: Option<String>,
    /// Rich-text blocks
    #[serde(default)]
    pub blocks: Option<Vec<serde_json::Value>>,
}

impl RemoteMessage {
    /// Posted by an integration rather than a person
    pub fn is_bot(&self) -> bool {
        self.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE)
    }

    /// Carries at least one rich-text block
    pub fn has_blocks(&self) -> bool {
        self.blocks.as_ref().is_some_and(|blocks| !blocks.is_empty())
    }

    /// Whether the message belongs in the store
    pub fn is_storable(&self) -> bool {
        !self.is_bot() && self.has_blocks()
    }

    /// Project to the stored top-level shape
    pub fn into_raw_event(self, channel_id: &str) -> RawEvent {
        RawEvent {
            blocks: self.blocks.unwrap_or_default(),
            event_timestamp: self.ts,
            thread_root_timestamp: self.thread_ts,
            author_id: self.user,
            channel_id: channel_id.to_string(),
        }
    }

    /// Project to the stored reply shape
    pub fn into_reply(self) -> ReplyEvent {
        ReplyEvent {
            blocks: self.blocks.unwrap_or_default(),
            event_timestamp: self.ts,
            author_id: self.user,
        }
    }
}

/// One page of messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePage {
    /// Messages in server order
    pub messages: Vec<RemoteMessage>,
    /// More messages remain beyond this page
    pub has_more: bool,
}

impl MessagePage {
    /// Final page with the given messages
    pub fn last(messages: Vec<RemoteMessage>) -> Self {
        Self {
            messages,
            has_more: false,
        }
    }
}

/// Remote conversation service
///
/// Implementations return single pages; callers drive pagination through
/// [`pagination::PaginationHelper`].
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// All channels visible to the token, across list pages
    async fn list_channels(&self) -> FetcherResult<Vec<ChannelRef>>;

    /// All workspace members, across list pages
    async fn list_users(&self) -> FetcherResult<Vec<UserRef>>;

    /// Newest-first page of top-level messages in `window`
    async fn fetch_history_page(
        &self,
        channel_id: &str,
        window: &TimeWindow,
    ) -> FetcherResult<MessagePage>;

    /// Oldest-first page of a thread, starting after `oldest`
    ///
    /// The root message is part of every page.
    async fn fetch_thread_page(
        &self,
        channel_id: &str,
        thread_root: &EventTimestamp,
        oldest: &EventTimestamp,
    ) -> FetcherResult<MessagePage>;
}

#[async_trait]
impl<T: ConversationApi + ?Sized> ConversationApi for Arc<T> {
    async fn list_channels(&self) -> FetcherResult<Vec<ChannelRef>> {
        (**self).list_channels().await
    }

    async fn list_users(&self) -> FetcherResult<Vec<UserRef>> {
        (**self).list_users().await
    }

    async fn fetch_history_page(
        &self,
        channel_id: &str,
        window: &TimeWindow,
    ) -> FetcherResult<MessagePage> {
        (**self).fetch_history_page(channel_id, window).await
    }

    async fn fetch_thread_page(
        &self,
        channel_id: &str,
        thread_root: &EventTimestamp,
        oldest: &EventTimestamp,
    ) -> FetcherResult<MessagePage> {
        (**self)
            .fetch_thread_page(channel_id, thread_root, oldest)
            .await
    }
}
