//! Org-mode export of enriched days
//!
//! One file per day. Each channel is a top-level heading, each message a
//! second-level heading with an inactive timestamp and the author, replies
//! one level deeper:
//!
//! ```text
//! * #general
//! ** [2020-04-09 Thu 10:00] *alice*
//! deploy is done
//! *** [2020-04-09 Thu 10:05] *bob*
//! thanks
//! ```

use super::blocks::BlockRenderer;
use super::enrich::EnrichedMessage;
use crate::directory::{Channels, Users};
use crate::output::{jsonl, OutputResult, ShardKind, StoreLayout};
use crate::EventTimestamp;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

const UNKNOWN_AUTHOR: &str = "UNKNOWN";

/// Render the `enriched_messages` shard of `date` to `org/<date>.org`
///
/// Channels are ordered by display name, messages newest first. Returns the
/// number of top-level messages rendered.
pub fn render_day(
    layout: &StoreLayout,
    date: NaiveDate,
    users: &Users,
    channels: &Channels,
) -> OutputResult<usize> {
    let messages: Vec<EnrichedMessage> =
        jsonl::read_day(&layout.shard_path(ShardKind::EnrichedMessages, date))?;
    let count = messages.len();

    let document = render_document(messages, users, channels);
    jsonl::write_atomic(
        &layout.shard_path(ShardKind::Org, date),
        document.as_bytes(),
    )?;
    info!(%date, messages = count, "Day exported");
    Ok(count)
}

/// Org text of one day's messages
pub fn render_document(
    messages: Vec<EnrichedMessage>,
    users: &Users,
    channels: &Channels,
) -> String {
    let renderer = BlockRenderer::new(users, channels);

    let mut by_channel: HashMap<String, Vec<EnrichedMessage>> = HashMap::new();
    for message in messages {
        by_channel
            .entry(message.record.event.channel_id.clone())
            .or_default()
            .push(message);
    }

    let mut groups: Vec<(String, Vec<EnrichedMessage>)> = by_channel
        .into_iter()
        .map(|(channel_id, messages)| (channels.display_name(&channel_id, users), messages))
        .collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sections = Vec::with_capacity(groups.len());
    for (channel_name, mut messages) in groups {
        messages.sort_by(|a, b| {
            b.record
                .event
                .event_timestamp
                .cmp(&a.record.event.event_timestamp)
        });

        let mut section = format!("* #{channel_name}\n");
        for message in &messages {
            let event = &message.record.event;
            let author = message
                .user_name
                .as_deref()
                .or(event.author_id.as_deref())
                .unwrap_or(UNKNOWN_AUTHOR);
            push_entry(
                &mut section,
                2,
                &event.event_timestamp,
                author,
                &renderer.render_blocks(&event.blocks),
            );

            for reply in message.record.thread.iter().flatten() {
                let author = reply
                    .author_id
                    .as_deref()
                    .map(|id| users.handle(id))
                    .unwrap_or(UNKNOWN_AUTHOR);
                push_entry(
                    &mut section,
                    3,
                    &reply.event_timestamp,
                    author,
                    &renderer.render_blocks(&reply.blocks),
                );
            }
        }
        sections.push(section);
    }

    sections.join("\n")
}

fn push_entry(out: &mut String, level: usize, ts: &EventTimestamp, author: &str, body: &str) {
    out.push_str(&"*".repeat(level));
    out.push(' ');
    out.push_str(&inactive_timestamp(ts));
    out.push_str(&format!(" *{author}*\n"));
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
}

/// `[2020-04-09 Thu 10:00]`, UTC
fn inactive_timestamp(ts: &EventTimestamp) -> String {
    match ts.to_datetime() {
        Some(instant) => instant.format("[%Y-%m-%d %a %H:%M]").to_string(),
        None => format!("[{ts}]"),
    }
}
