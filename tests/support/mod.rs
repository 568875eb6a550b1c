//! In-memory Slack workspace for driving the sync engine

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use slack_history_sync::fetcher::{
    ConversationApi, FetcherError, FetcherResult, MessagePage, RemoteMessage,
};
use slack_history_sync::{ChannelRef, EventTimestamp, TimeWindow, UserRef};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// Page size used by the mock unless overridden
pub const DEFAULT_PAGE_SIZE: usize = 2;

/// Workspace state served through [`ConversationApi`]
pub struct MockSlack {
    users: Vec<UserRef>,
    channels: Vec<ChannelRef>,
    page_size: usize,
    history: Mutex<HashMap<String, Vec<RemoteMessage>>>,
    replies: Mutex<HashMap<(String, String), Vec<RemoteMessage>>>,
    failures: Mutex<VecDeque<FetcherError>>,
    broken_days: Mutex<Vec<(String, EventTimestamp)>>,
    calls: Mutex<Vec<String>>,
}

impl MockSlack {
    /// Workspace with alice, bob, #general (member), #random (not a member)
    /// and a direct message with bob
    pub fn new() -> Self {
        Self {
            users: vec![user("U1", "alice", "Alice Liddell"), user("U2", "bob", "Bob Dylan")],
            channels: vec![
                channel("C1", Some("general"), true, None),
                channel("C2", Some("random"), false, None),
                channel("D1", None, false, Some("U2")),
            ],
            page_size: DEFAULT_PAGE_SIZE,
            history: Mutex::default(),
            replies: Mutex::default(),
            failures: Mutex::default(),
            broken_days: Mutex::default(),
            calls: Mutex::default(),
        }
    }

    /// Serve `page_size` messages per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Post a top-level message
    pub fn post(&self, channel_id: &str, message: RemoteMessage) {
        self.history
            .lock()
            .unwrap()
            .entry(channel_id.to_string())
            .or_default()
            .push(message);
    }

    /// Post a reply to the thread rooted at `root`; the root must be posted too
    pub fn reply(&self, channel_id: &str, root: &str, message: RemoteMessage) {
        self.replies
            .lock()
            .unwrap()
            .entry((channel_id.to_string(), root.to_string()))
            .or_default()
            .push(message);
    }

    /// Fail the next calls, in order, with `errors`
    pub fn fail_next(&self, errors: impl IntoIterator<Item = FetcherError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    /// Fail every history request of `channel_id` for `date` until healed
    pub fn break_day(&self, channel_id: &str, date: NaiveDate) {
        self.broken_days
            .lock()
            .unwrap()
            .push((channel_id.to_string(), TimeWindow::for_date(date).oldest));
    }

    /// Serve every broken day again
    pub fn heal(&self) {
        self.broken_days.lock().unwrap().clear();
    }

    /// Requests served so far, e.g. `history C1 <oldest> <latest>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests whose log line starts with `prefix`
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Forget the request log
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) -> FetcherResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn page(&self, mut messages: Vec<RemoteMessage>) -> MessagePage {
        let has_more = messages.len() > self.page_size;
        messages.truncate(self.page_size);
        MessagePage { messages, has_more }
    }
}

#[async_trait]
impl ConversationApi for MockSlack {
    async fn list_channels(&self) -> FetcherResult<Vec<ChannelRef>> {
        self.record("channels".to_string())?;
        Ok(self.channels.clone())
    }

    async fn list_users(&self) -> FetcherResult<Vec<UserRef>> {
        self.record("users".to_string())?;
        Ok(self.users.clone())
    }

    async fn fetch_history_page(
        &self,
        channel_id: &str,
        window: &TimeWindow,
    ) -> FetcherResult<MessagePage> {
        self.record(format!(
            "history {channel_id} {} {}",
            window.oldest, window.latest
        ))?;
        let broken = self
            .broken_days
            .lock()
            .unwrap()
            .iter()
            .any(|(c, oldest)| c == channel_id && *oldest == window.oldest);
        if broken {
            return Err(FetcherError::ApiError("channel_not_found".to_string()));
        }

        let mut messages: Vec<RemoteMessage> = self
            .history
            .lock()
            .unwrap()
            .get(channel_id)
            .map(|all| {
                all.iter()
                    .filter(|m| m.ts >= window.oldest && m.ts < window.latest)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Newest first, like conversations.history
        messages.sort_by(|a, b| b.ts.cmp(&a.ts));
        Ok(self.page(messages))
    }

    async fn fetch_thread_page(
        &self,
        channel_id: &str,
        thread_root: &EventTimestamp,
        oldest: &EventTimestamp,
    ) -> FetcherResult<MessagePage> {
        self.record(format!("replies {channel_id} {thread_root} {oldest}"))?;

        let root = self
            .history
            .lock()
            .unwrap()
            .get(channel_id)
            .and_then(|all| all.iter().find(|m| &m.ts == thread_root).cloned())
            .ok_or_else(|| FetcherError::ApiError("thread_not_found".to_string()))?;

        let mut replies: Vec<RemoteMessage> = self
            .replies
            .lock()
            .unwrap()
            .get(&(channel_id.to_string(), thread_root.to_string()))
            .map(|all| all.iter().filter(|m| &m.ts > oldest).cloned().collect())
            .unwrap_or_default();
        replies.sort_by(|a, b| a.ts.cmp(&b.ts));

        // conversations.replies repeats the parent at the head of every page
        let has_more = replies.len() > self.page_size;
        replies.truncate(self.page_size);
        let mut messages = vec![root];
        messages.extend(replies);
        Ok(MessagePage { messages, has_more })
    }
}

/// Timestamp `hour:minute` UTC on `date`, with `seq` as microseconds
pub fn ts_at(date: NaiveDate, hour: u32, minute: u32, seq: u32) -> String {
    let instant = Utc
        .from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
        .timestamp();
    format!("{instant}.{seq:06}")
}

/// Human message with a single text block
pub fn message(ts: &str, user: &str, text: &str) -> RemoteMessage {
    RemoteMessage {
        ts: EventTimestamp::parse(ts).unwrap(),
        thread_ts: None,
        user: Some(user.to_string()),
        subtype: None,
        blocks: Some(vec![text_block(text)]),
    }
}

/// Thread root: a message whose thread marker is its own timestamp
pub fn root(ts: &str, user: &str, text: &str) -> RemoteMessage {
    let mut msg = message(ts, user, text);
    msg.thread_ts = Some(EventTimestamp::parse(ts).unwrap());
    msg
}

/// Reply in the thread rooted at `root_ts`
pub fn reply(ts: &str, root_ts: &str, user: &str, text: &str) -> RemoteMessage {
    let mut msg = message(ts, user, text);
    msg.thread_ts = Some(EventTimestamp::parse(root_ts).unwrap());
    msg
}

/// Integration post without a human author
pub fn bot_message(ts: &str, text: &str) -> RemoteMessage {
    let mut msg = message(ts, "B1", text);
    msg.subtype = Some("bot_message".to_string());
    msg
}

/// Join notice and other messages without blocks
pub fn blockless(ts: &str, user: &str) -> RemoteMessage {
    let mut msg = message(ts, user, "");
    msg.subtype = Some("channel_join".to_string());
    msg.blocks = None;
    msg
}

/// Rich-text block holding one text run
pub fn text_block(text: &str) -> serde_json::Value {
    json!({
        "type": "rich_text",
        "block_id": "b1",
        "elements": [{
            "type": "rich_text_section",
            "elements": [{"type": "text", "text": text}]
        }]
    })
}

/// `2020-04-<day>`
pub fn april(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 4, day).unwrap()
}

/// File contents of every shard under `root`, keyed by relative path
pub fn snapshot_shards(root: &std::path::Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for dir in ["raw_messages", "raw_threads"] {
        let Ok(entries) = std::fs::read_dir(root.join(dir)) else {
            continue;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            files.insert(
                format!("{dir}/{}", path.file_name().unwrap().to_string_lossy()),
                std::fs::read(&path).unwrap(),
            );
        }
    }
    files
}

fn user(id: &str, name: &str, real_name: &str) -> UserRef {
    UserRef {
        id: id.to_string(),
        name: name.to_string(),
        real_name: Some(real_name.to_string()),
        deleted: false,
        is_bot: false,
    }
}

fn channel(id: &str, name: Option<&str>, is_member: bool, dm_user: Option<&str>) -> ChannelRef {
    ChannelRef {
        id: id.to_string(),
        name: name.map(str::to_string),
        is_member,
        is_im: dm_user.is_some(),
        is_mpim: false,
        user: dm_user.map(str::to_string),
    }
}
