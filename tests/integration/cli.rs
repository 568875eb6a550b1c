//! Binary-level tests: a full sync against a mocked Web API, then the
//! offline commands over the resulting store

use assert_cmd::Command;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Exclusive lower bound sent for 2020-04-09, one microsecond before midnight
const APRIL_9: &str = "1586390399.999999";
/// 2020-04-09T10:00:00Z
const ROOT_TS: &str = "1586426400.000000";

fn cli(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("slack-history-sync").unwrap();
    cmd.arg("--storage-location")
        .arg(store)
        .arg("--config")
        .arg(store.join("absent.toml"))
        .env_remove("SLACK_TOKEN")
        .env_remove("SLACK_API_URL")
        .env("RUST_LOG", "slack_history_sync=warn");
    cmd
}

async fn mock_workspace() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "members": [
                {"id": "U1", "name": "alice", "real_name": "Alice Liddell"},
                {"id": "U2", "name": "bob"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [
                {"id": "C1", "name": "general", "is_member": true},
                {"id": "C2", "name": "random", "is_member": false}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversations.history"))
        .and(query_param("channel", "C1"))
        .and(query_param("oldest", APRIL_9))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": [
                {"ts": ROOT_TS, "thread_ts": ROOT_TS, "user": "U1", "blocks": [rich_text("release?")]},
                {"ts": "1586422800.000000", "user": "U2", "blocks": [rich_text("morning")]},
                {"ts": "1586419200.000000", "subtype": "bot_message", "blocks": [rich_text("beep")]}
            ],
            "has_more": false
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversations.history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": [],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversations.replies"))
        .and(query_param("ts", ROOT_TS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": [
                {"ts": ROOT_TS, "thread_ts": ROOT_TS, "user": "U1", "blocks": [rich_text("release?")]},
                {"ts": "1586426700.000000", "thread_ts": ROOT_TS, "user": "U2", "blocks": [rich_text("shipped")]}
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    server
}

fn rich_text(text: &str) -> Value {
    json!({
        "type": "rich_text",
        "elements": [{"type": "rich_text_section", "elements": [{"type": "text", "text": text}]}]
    })
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_then_enrich_and_export() {
    let server = mock_workspace().await;
    let store = TempDir::new().unwrap();
    let root = store.path().to_path_buf();
    let api_url = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        cli(&root)
            .args([
                "sync",
                "--token",
                "xoxp-test",
                "--api-url",
                api_url.as_str(),
                "--start-date",
                "2020-04-09",
                "--end-date",
                "2020-04-11",
                "--threads-lookback",
                "1",
                "--today",
                "2020-04-11",
                "--output-format",
                "json",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();
    assert!(
        output.status.success(),
        "sync failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary = stdout_json(&output);
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["messages"]["fetched"], 2);
    assert_eq!(summary["messages"]["frozen"], 2);
    assert_eq!(summary["threads"]["frozen"], 1);

    let status = cli(store.path())
        .args(["status", "--output-format", "json"])
        .output()
        .unwrap();
    assert!(status.status.success());
    let rows = stdout_json(&status);
    assert_eq!(
        rows,
        json!([
            {"date": "2020-04-09", "messages_complete": true, "threads_complete": true},
            {"date": "2020-04-10", "messages_complete": true, "threads_complete": false}
        ])
    );

    cli(store.path()).arg("enrich").assert().success();
    cli(store.path()).arg("export").assert().success();

    let org = std::fs::read_to_string(store.path().join("org/2020-04-09.org")).unwrap();
    assert!(org.starts_with("* #general\n"));
    assert!(org.contains("*** [2020-04-09 Thu 10:05] *bob*\nshipped\n"));
    assert!(!org.contains("beep"));

    cli(store.path()).arg("validate").assert().success();
}

#[test]
fn test_status_of_empty_store() {
    let store = TempDir::new().unwrap();

    let output = cli(store.path())
        .args(["status", "--output-format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_json(&output), json!([]));
}

#[test]
fn test_validate_flags_corrupt_shard() {
    let store = TempDir::new().unwrap();
    std::fs::create_dir_all(store.path().join("raw_messages")).unwrap();
    std::fs::write(store.path().join("raw_messages/2020-04-09.jsonl"), "{broken\n").unwrap();

    cli(store.path()).arg("validate").assert().failure();
}

#[test]
fn test_sync_requires_a_token() {
    let store = TempDir::new().unwrap();

    cli(store.path())
        .args(["sync", "--start-date", "2020-04-09"])
        .assert()
        .failure();
}

#[test]
fn test_sync_rejects_reversed_range() {
    let store = TempDir::new().unwrap();

    cli(store.path())
        .args([
            "sync",
            "--token",
            "xoxp-test",
            "--api-url",
            "http://127.0.0.1:9",
            "--start-date",
            "2020-04-11",
            "--end-date",
            "2020-04-09",
        ])
        .assert()
        .failure();
}
