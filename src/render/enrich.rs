//! Name enrichment of thread records

use crate::directory::{Channels, Users};
use crate::output::{jsonl, OutputResult, ShardKind, StoreLayout};
use crate::EnrichedDayRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A thread record with resolved names, as stored in `enriched_messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedMessage {
    /// The record as synced
    #[serde(flatten)]
    pub record: EnrichedDayRecord,
    /// Author handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Author full name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_full_name: Option<String>,
    /// Channel display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
}

impl EnrichedMessage {
    /// Resolve the names of `record`; unresolvable names stay absent
    pub fn new(record: EnrichedDayRecord, users: &Users, channels: &Channels) -> Self {
        let author = record
            .event
            .author_id
            .as_deref()
            .and_then(|id| users.for_id(id));
        let channel_name = channels
            .for_id(&record.event.channel_id)
            .map(|channel| channels.display_name(&channel.id, users));

        Self {
            user_name: author.map(|user| user.name.clone()),
            user_full_name: author.and_then(|user| user.real_name.clone()),
            channel_name,
            record,
        }
    }
}

/// Enrich the `raw_threads` shard of `date` into `enriched_messages`
///
/// Returns the number of records written.
pub fn enrich_day(
    layout: &StoreLayout,
    date: NaiveDate,
    users: &Users,
    channels: &Channels,
) -> OutputResult<usize> {
    let records: Vec<EnrichedDayRecord> =
        jsonl::read_day(&layout.shard_path(ShardKind::RawThreads, date))?;

    let enriched: Vec<EnrichedMessage> = records
        .into_iter()
        .map(|record| EnrichedMessage::new(record, users, channels))
        .collect();

    let written = jsonl::write_day(
        &layout.shard_path(ShardKind::EnrichedMessages, date),
        &enriched,
    )?;
    info!(%date, records = written, "Day enriched");
    Ok(written)
}
