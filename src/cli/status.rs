//! Status command implementation

use super::{Cli, CliError, OutputFormat};
use crate::calendar;
use crate::output::StoreLayout;
use crate::resume::{CheckpointEntry, CheckpointStore};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;

/// Status command arguments
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// First date to show (YYYY-MM-DD); default: first recorded date
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// First date not shown (YYYY-MM-DD); default: after the last recorded date
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

/// Flags of one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayStatus {
    /// Date
    pub date: NaiveDate,
    /// Recorded flags, both `false` when the date was never attempted
    #[serde(flatten)]
    pub entry: CheckpointEntry,
}

impl StatusArgs {
    /// Rows to display for `store`
    ///
    /// Without an explicit range only recorded dates are listed; with a range
    /// every date of it is, unrecorded ones as pending.
    pub fn rows(&self, store: &CheckpointStore) -> Vec<DayStatus> {
        let recorded: Vec<NaiveDate> = store.entries().map(|(date, _)| date).collect();
        let (Some(first), Some(last)) = (recorded.first(), recorded.last()) else {
            return match (self.start_date, self.end_date) {
                (Some(start), Some(end)) => calendar::date_range(start, end)
                    .map(|date| DayStatus {
                        date,
                        entry: CheckpointEntry::default(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
        };

        let start = self.start_date.unwrap_or(*first);
        let end = self.end_date.unwrap_or_else(|| calendar::next_day(*last));
        calendar::date_range(start, end)
            .map(|date| DayStatus {
                date,
                entry: store.entry(date),
            })
            .collect()
    }

    /// Print the status table
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let layout = StoreLayout::new(cli.store_root()?);
        let store = CheckpointStore::load(layout.status_path())?;
        let rows = self.rows(&store);

        match cli.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&rows)
                    .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
                println!("{json}");
            }
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No days recorded in {}", layout.root().display());
                    return Ok(());
                }
                println!("{:<12} {:<10} {:<10}", "DATE", "MESSAGES", "THREADS");
                for row in &rows {
                    println!(
                        "{:<12} {:<10} {:<10}",
                        row.date.to_string(),
                        label(row.entry.messages_complete),
                        label(row.entry.threads_complete)
                    );
                }
            }
        }
        Ok(())
    }
}

fn label(complete: bool) -> &'static str {
    if complete {
        "complete"
    } else {
        "pending"
    }
}
