//! Thread reconciliation
//!
//! Turns a day's top-level messages of one channel into stored records,
//! fetching the replies of every thread root.

use crate::fetcher::pagination::PaginationHelper;
use crate::fetcher::{ConversationApi, FetcherResult, RemoteMessage};
use crate::{EnrichedDayRecord, ReplyEvent};
use tracing::debug;

/// Attaches replies to thread roots
pub struct ThreadReconciler;

impl ThreadReconciler {
    /// Records for `day_events` of `channel_id`, in input order
    ///
    /// Bot messages and messages without blocks are dropped. Thread roots get
    /// their replies in thread order with the root itself removed; other
    /// events carry no thread. A failed reply fetch fails the whole call.
    pub async fn reconcile<A>(
        api: &A,
        channel_id: &str,
        day_events: Vec<RemoteMessage>,
    ) -> FetcherResult<Vec<EnrichedDayRecord>>
    where
        A: ConversationApi + ?Sized,
    {
        let mut records = Vec::new();

        for event in day_events.into_iter().filter(RemoteMessage::is_storable) {
            let event = event.into_raw_event(channel_id);
            if !event.is_thread_root() {
                records.push(EnrichedDayRecord::plain(event));
                continue;
            }

            let root = event.event_timestamp.clone();
            let replies: Vec<ReplyEvent> =
                PaginationHelper::fetch_thread(api, channel_id, root.clone())
                    .await?
                    .into_iter()
                    .filter(|message| message.ts != root)
                    .map(RemoteMessage::into_reply)
                    .collect();

            debug!(
                channel = channel_id,
                thread = %root,
                replies = replies.len(),
                "Thread attached"
            );
            records.push(EnrichedDayRecord {
                event,
                thread: Some(replies),
            });
        }

        Ok(records)
    }
}
