//! Slack Web API client
//!
//! Single-attempt HTTP calls with error classification. Retrying is layered
//! on top by [`crate::fetcher::retry::RetryingApi`], so a 429 or a Slack
//! `ok: false` surfaces here as a typed [`FetcherError`] and nothing more.

use crate::fetcher::{ConversationApi, FetcherError, FetcherResult, MessagePage, RemoteMessage};
use crate::metrics::HttpRequestMetrics;
use crate::sync::config::PAGE_LIMIT;
use crate::sync::rate_limit::RateLimiter;
use crate::{ChannelRef, EventTimestamp, TimeWindow, UserRef};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Production API root
pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Conversation types mirrored by the sync
const CONVERSATION_TYPES: &str = "public_channel,private_channel,mpim,im";

/// Upper bound on `conversations.list` / `users.list` pages
const MAX_LIST_PAGES: usize = 1_000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<RemoteMessage>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    channels: Vec<ChannelRef>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    members: Vec<UserRef>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

/// HTTP implementation of [`ConversationApi`] against the Slack Web API
pub struct SlackHttpClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limiter: RateLimiter,
}

impl SlackHttpClient {
    /// Client for the production API
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>) -> FetcherResult<Self> {
        Self::with_base_url(token, SLACK_API_BASE_URL)
    }

    /// Client for an alternative API root (proxies, test servers)
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> FetcherResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetcherError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            rate_limiter: RateLimiter::default(),
        })
    }

    /// Replace the default request limiter
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// API root in use
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call a Web API method and deserialize its successful body
    async fn get<T>(&self, api_method: &str, params: &[(&str, String)]) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, api_method);

        self.rate_limiter
            .acquire()
            .await
            .map_err(|e| FetcherError::NetworkError(format!("rate limiter error: {e}")))?;

        debug!(method = api_method, params = params.len(), "Calling Slack API");
        let metrics = HttpRequestMetrics::start(api_method);

        let response = match self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                metrics.record_network_error();
                return Err(if e.is_timeout() {
                    FetcherError::Timeout(e.to_string())
                } else {
                    FetcherError::NetworkError(e.to_string())
                });
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if status.as_u16() == 429 {
            let retry_after = parse_retry_after(response.headers());
            return Err(FetcherError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FetcherError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetcherError::Timeout(e.to_string())
            } else {
                FetcherError::NetworkError(e.to_string())
            }
        })?;

        let envelope: Envelope = serde_json::from_slice(&body)
            .map_err(|e| FetcherError::ParseError(format!("{api_method}: {e}")))?;
        if !envelope.ok {
            let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            if code == "ratelimited" {
                metrics.record_rate_limited();
                return Err(FetcherError::RateLimited { retry_after });
            }
            warn!(method = api_method, error = %code, "Slack API returned an error");
            return Err(FetcherError::ApiError(code));
        }

        serde_json::from_slice(&body)
            .map_err(|e| FetcherError::ParseError(format!("{api_method}: {e}")))
    }

    /// Follow `response_metadata.next_cursor` across list pages
    async fn list_all<R, T>(
        &self,
        api_method: &str,
        params: &[(&str, String)],
        split: fn(R) -> (Vec<T>, String),
    ) -> FetcherResult<Vec<T>>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor = String::new();

        for page in 0..MAX_LIST_PAGES {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("limit", PAGE_LIMIT.to_string()));
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }

            let (batch, next_cursor) = split(self.get::<R>(api_method, &query).await?);
            debug!(
                method = api_method,
                page = page + 1,
                items = batch.len(),
                "Fetched list page"
            );
            items.extend(batch);

            if next_cursor.is_empty() {
                return Ok(items);
            }
            if next_cursor == cursor {
                return Err(FetcherError::MalformedPagination(format!(
                    "{api_method} returned the same cursor twice"
                )));
            }
            cursor = next_cursor;
        }

        Err(FetcherError::MalformedPagination(format!(
            "more than {MAX_LIST_PAGES} pages from {api_method}"
        )))
    }
}

#[async_trait]
impl ConversationApi for SlackHttpClient {
    async fn list_channels(&self) -> FetcherResult<Vec<ChannelRef>> {
        self.list_all(
            "conversations.list",
            &[("types", CONVERSATION_TYPES.to_string())],
            |r: ChannelsResponse| (r.channels, r.response_metadata.next_cursor),
        )
        .await
    }

    async fn list_users(&self) -> FetcherResult<Vec<UserRef>> {
        self.list_all("users.list", &[], |r: UsersResponse| {
            (r.members, r.response_metadata.next_cursor)
        })
        .await
    }

    async fn fetch_history_page(
        &self,
        channel_id: &str,
        window: &TimeWindow,
    ) -> FetcherResult<MessagePage> {
        // Slack's bounds are both exclusive; shift `oldest` so the window
        // keeps events stamped exactly at its start.
        let params = [
            ("channel", channel_id.to_string()),
            ("oldest", window.oldest.pred_micro().to_string()),
            ("latest", window.latest.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response: HistoryResponse = self.get("conversations.history", &params).await?;
        Ok(MessagePage {
            messages: response.messages,
            has_more: response.has_more,
        })
    }

    async fn fetch_thread_page(
        &self,
        channel_id: &str,
        thread_root: &EventTimestamp,
        oldest: &EventTimestamp,
    ) -> FetcherResult<MessagePage> {
        let params = [
            ("channel", channel_id.to_string()),
            ("ts", thread_root.to_string()),
            ("oldest", oldest.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response: HistoryResponse = self.get("conversations.replies", &params).await?;
        Ok(MessagePage {
            messages: response.messages,
            has_more: response.has_more,
        })
    }
}

/// Parse a `Retry-After` header given in whole seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    match value.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            warn!("Failed to parse Retry-After header '{}': {}", value, e);
            None
        }
    }
}
