//! Pagination over history and thread windows
//!
//! `conversations.history` pages newest-first: after each page the upper
//! bound `latest` moves down to the last (oldest) timestamp seen.
//! `conversations.replies` pages oldest-first: the lower bound `oldest` moves
//! up to the last reply seen.
//!
//! Includes safety mechanisms:
//! - Maximum page limit to prevent infinite loops
//! - A page claiming `has_more` must be non-empty and move the cursor

use crate::fetcher::{ConversationApi, FetcherError, FetcherResult, RemoteMessage};
use crate::{EventTimestamp, TimeWindow};
use futures_util::stream::{self, Stream, TryStreamExt};
use std::pin::Pin;
use tracing::debug;

/// Maximum number of pages per window to prevent infinite loops
pub const MAX_PAGES: usize = 10_000;

/// Lazy stream of message pages in fetch order
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = FetcherResult<Vec<RemoteMessage>>> + Send + 'a>>;

/// Pagination helper for conversation windows
pub struct PaginationHelper;

impl PaginationHelper {
    /// Pages of top-level messages of `channel_id` within `window`
    ///
    /// # Errors
    /// Yields [`FetcherError::MalformedPagination`] when a page claims more
    /// results but is empty, does not move the cursor, or the page limit is hit.
    pub fn history_pages<'a, A>(api: &'a A, channel_id: &'a str, window: TimeWindow) -> PageStream<'a>
    where
        A: ConversationApi + ?Sized,
    {
        Box::pin(stream::try_unfold(
            Some((window, 0usize)),
            move |cursor| async move {
                let Some((window, page)) = cursor else {
                    return Ok(None);
                };

                if page >= MAX_PAGES {
                    return Err(FetcherError::MalformedPagination(format!(
                        "more than {MAX_PAGES} history pages for {channel_id}, last latest={}",
                        window.latest
                    )));
                }

                let result = api.fetch_history_page(channel_id, &window).await?;
                debug!(
                    channel = channel_id,
                    page = page + 1,
                    messages = result.messages.len(),
                    has_more = result.has_more,
                    latest = %window.latest,
                    "Fetched history page"
                );

                if !result.has_more {
                    return Ok(Some((result.messages, None)));
                }

                let next_latest = match result.messages.last() {
                    Some(last) => last.ts.clone(),
                    None => {
                        return Err(FetcherError::MalformedPagination(format!(
                            "empty history page with has_more for {channel_id}"
                        )))
                    }
                };

                if next_latest >= window.latest {
                    return Err(FetcherError::MalformedPagination(format!(
                        "history cursor for {channel_id} did not advance: {next_latest} >= {}",
                        window.latest
                    )));
                }

                let next = window.with_latest(next_latest);
                Ok(Some((result.messages, Some((next, page + 1)))))
            },
        ))
    }

    /// Pages of the thread rooted at `thread_root`, root included on each page
    ///
    /// # Errors
    /// Same guards as [`PaginationHelper::history_pages`], with the lower
    /// bound `oldest` as cursor.
    pub fn thread_pages<'a, A>(
        api: &'a A,
        channel_id: &'a str,
        thread_root: EventTimestamp,
    ) -> PageStream<'a>
    where
        A: ConversationApi + ?Sized,
    {
        let oldest = thread_root.clone();
        Box::pin(stream::try_unfold(
            Some((oldest, 0usize)),
            move |cursor| {
                let thread_root = thread_root.clone();
                async move {
                    let Some((oldest, page)) = cursor else {
                        return Ok(None);
                    };

                    if page >= MAX_PAGES {
                        return Err(FetcherError::MalformedPagination(format!(
                            "more than {MAX_PAGES} reply pages for {channel_id}/{thread_root}"
                        )));
                    }

                    let result = api
                        .fetch_thread_page(channel_id, &thread_root, &oldest)
                        .await?;
                    debug!(
                        channel = channel_id,
                        thread = %thread_root,
                        page = page + 1,
                        messages = result.messages.len(),
                        has_more = result.has_more,
                        "Fetched replies page"
                    );

                    if !result.has_more {
                        return Ok(Some((result.messages, None)));
                    }

                    let next_oldest = match result.messages.last() {
                        Some(last) => last.ts.clone(),
                        None => {
                            return Err(FetcherError::MalformedPagination(format!(
                                "empty replies page with has_more for {channel_id}/{thread_root}"
                            )))
                        }
                    };

                    if next_oldest <= oldest {
                        return Err(FetcherError::MalformedPagination(format!(
                            "replies cursor for {channel_id}/{thread_root} did not advance: {next_oldest} <= {oldest}"
                        )));
                    }

                    Ok(Some((result.messages, Some((next_oldest, page + 1)))))
                }
            },
        ))
    }

    /// Every top-level message of the window, in fetch order (newest first)
    pub async fn fetch_window<A>(
        api: &A,
        channel_id: &str,
        window: TimeWindow,
    ) -> FetcherResult<Vec<RemoteMessage>>
    where
        A: ConversationApi + ?Sized,
    {
        Self::history_pages(api, channel_id, window)
            .try_concat()
            .await
    }

    /// Every message of a thread, in fetch order, root occurrences included
    pub async fn fetch_thread<A>(
        api: &A,
        channel_id: &str,
        thread_root: EventTimestamp,
    ) -> FetcherResult<Vec<RemoteMessage>>
    where
        A: ConversationApi + ?Sized,
    {
        Self::thread_pages(api, channel_id, thread_root)
            .try_concat()
            .await
    }
}
