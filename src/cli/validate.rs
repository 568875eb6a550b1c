//! Validation subcommand

use super::{Cli, CliError, OutputFormat};
use crate::output::{jsonl, OutputResult, ShardKind, StoreLayout};
use crate::render::EnrichedMessage;
use crate::resume::CheckpointStore;
use crate::{ChannelRef, EnrichedDayRecord, RawEvent, UserRef};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Validate command arguments
#[derive(Parser, Debug)]
pub struct ValidateArgs {}

/// Outcome of checking one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Checked file
    pub path: PathBuf,
    /// Records read, `None` when the file is invalid
    pub records: Option<usize>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn from_result<E: std::fmt::Display>(path: PathBuf, result: Result<usize, E>) -> Self {
        match result {
            Ok(records) => Self {
                path,
                records: Some(records),
                error: None,
            },
            Err(e) => Self {
                path,
                records: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Whether the file parsed
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Check the status file, the directory snapshots and every JSON Lines shard
pub fn validate_store(layout: &StoreLayout) -> Result<Vec<FileReport>, CliError> {
    let mut reports = Vec::new();

    let status_path = layout.status_path();
    reports.push(FileReport::from_result(
        status_path.clone(),
        CheckpointStore::load(&status_path).map(|store| store.entries().count()),
    ));

    let users_path = layout.users_path();
    if users_path.exists() {
        let result = count::<UserRef>(&users_path);
        reports.push(FileReport::from_result(users_path, result));
    }
    let channels_path = layout.channels_path();
    if channels_path.exists() {
        let result = count::<ChannelRef>(&channels_path);
        reports.push(FileReport::from_result(channels_path, result));
    }

    for kind in ShardKind::ALL.into_iter().filter(ShardKind::is_jsonl) {
        for date in layout.list_shards(kind)? {
            let path = layout.shard_path(kind, date);
            let result = match kind {
                ShardKind::RawMessages => count::<RawEvent>(&path),
                ShardKind::RawThreads => count::<EnrichedDayRecord>(&path),
                ShardKind::EnrichedMessages => count::<EnrichedMessage>(&path),
                ShardKind::Org => continue,
            };
            debug!(path = %path.display(), valid = result.is_ok(), "Shard checked");
            reports.push(FileReport::from_result(path, result));
        }
    }

    Ok(reports)
}

fn count<T: serde::de::DeserializeOwned>(path: &Path) -> OutputResult<usize> {
    jsonl::read_day::<T>(path).map(|records| records.len())
}

impl ValidateArgs {
    /// Execute the validation command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let layout = StoreLayout::new(cli.store_root()?);
        if !layout.root().is_dir() {
            return Err(CliError::InvalidArgument(format!(
                "{} is not a directory",
                layout.root().display()
            )));
        }

        let reports = validate_store(&layout)?;
        let invalid = reports.iter().filter(|r| !r.is_valid()).count();

        match cli.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&reports)
                    .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
                println!("{json}");
            }
            OutputFormat::Human => {
                for report in reports.iter().filter(|r| !r.is_valid()) {
                    println!(
                        "  - {} ({})",
                        report.path.display(),
                        report.error.as_deref().unwrap_or_default()
                    );
                }
                println!("\nSummary:");
                println!("  Valid files: {}", reports.len() - invalid);
                if invalid > 0 {
                    println!("  Invalid files: {invalid}");
                }
            }
        }

        if invalid > 0 {
            error!(invalid, "Store validation failed");
            return Err(CliError::ValidationFailed(format!(
                "{invalid} invalid file(s) in {}",
                layout.root().display()
            )));
        }
        Ok(())
    }
}
