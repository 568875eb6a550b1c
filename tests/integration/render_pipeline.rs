//! Sync, enrich and export over one store

use crate::support::{april, message, reply, root, ts_at, MockSlack};
use slack_history_sync::directory::{Channels, Users};
use slack_history_sync::output::{jsonl, ShardKind, StoreLayout};
use slack_history_sync::render::{enrich_day, render_day, EnrichedMessage};
use slack_history_sync::sync::{SyncExecutor, SyncJob};
use std::sync::Arc;
use tempfile::TempDir;

async fn synced_store(dir: &TempDir) -> StoreLayout {
    let slack = MockSlack::new();
    let thread = ts_at(april(10), 12, 0, 0);
    slack.post("C1", root(&thread, "U2", "thread ten"));
    slack.reply("C1", &thread, reply(&ts_at(april(10), 12, 30, 0), &thread, "U1", "same day"));
    slack.post("C1", message(&ts_at(april(10), 9, 15, 0), "U9", "who am i"));
    slack.post("D1", message(&ts_at(april(10), 18, 0, 0), "U2", "dm"));

    SyncExecutor::open(Arc::new(slack), dir.path(), 1)
        .unwrap()
        .with_today(april(14))
        .run(&SyncJob::new(april(10), april(11)))
        .await
        .unwrap();
    StoreLayout::new(dir.path())
}

#[tokio::test]
async fn test_enrichment_resolves_names() {
    let dir = TempDir::new().unwrap();
    let layout = synced_store(&dir).await;
    let users = Users::load(&layout).unwrap();
    let channels = Channels::load(&layout).unwrap();

    let written = enrich_day(&layout, april(10), &users, &channels).unwrap();
    assert_eq!(written, 3);

    let enriched: Vec<EnrichedMessage> =
        jsonl::read_day(&layout.shard_path(ShardKind::EnrichedMessages, april(10))).unwrap();

    let dm = enriched
        .iter()
        .find(|m| m.record.event.channel_id == "D1")
        .unwrap();
    assert_eq!(dm.user_name.as_deref(), Some("bob"));
    assert_eq!(dm.user_full_name.as_deref(), Some("Bob Dylan"));
    assert_eq!(dm.channel_name.as_deref(), Some("bob"));

    let stranger = enriched
        .iter()
        .find(|m| m.record.event.author_id.as_deref() == Some("U9"))
        .unwrap();
    assert!(stranger.user_name.is_none());
    assert_eq!(stranger.channel_name.as_deref(), Some("general"));
}

#[tokio::test]
async fn test_export_writes_org_document() {
    let dir = TempDir::new().unwrap();
    let layout = synced_store(&dir).await;
    let users = Users::load(&layout).unwrap();
    let channels = Channels::load(&layout).unwrap();
    enrich_day(&layout, april(10), &users, &channels).unwrap();

    let rendered = render_day(&layout, april(10), &users, &channels).unwrap();
    assert_eq!(rendered, 3);

    let org = std::fs::read_to_string(layout.shard_path(ShardKind::Org, april(10))).unwrap();
    let expected = "\
* #bob
** [2020-04-10 Fri 18:00] *bob*
dm

* #general
** [2020-04-10 Fri 12:00] *bob*
thread ten
*** [2020-04-10 Fri 12:30] *alice*
same day
** [2020-04-10 Fri 09:15] *U9*
who am i
";
    assert_eq!(org, expected);
}

#[tokio::test]
async fn test_export_without_enrichment_reports_missing_shard() {
    let dir = TempDir::new().unwrap();
    let layout = synced_store(&dir).await;
    let users = Users::load(&layout).unwrap();
    let channels = Channels::load(&layout).unwrap();

    let err = render_day(&layout, april(10), &users, &channels).unwrap_err();
    assert!(matches!(
        err,
        slack_history_sync::output::OutputError::ShardNotFound(_)
    ));
}
