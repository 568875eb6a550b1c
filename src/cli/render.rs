//! Enrich and export command implementations

use super::{Cli, CliError, OutputFormat};
use crate::directory::{Channels, Users};
use crate::output::{ShardKind, StoreLayout};
use crate::render;
use chrono::NaiveDate;
use clap::{Args, Parser};
use tracing::info;

/// Date selection shared by the render commands
#[derive(Args, Debug, Clone)]
pub struct DateSelection {
    /// First date (YYYY-MM-DD); default: every available day
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// First date not processed (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

impl DateSelection {
    /// Dates with a `source` shard inside the selection, ascending
    pub fn dates(&self, layout: &StoreLayout, source: ShardKind) -> Result<Vec<NaiveDate>, CliError> {
        let available = layout.list_shards(source)?;
        Ok(available
            .into_iter()
            .filter(|date| self.start_date.map_or(true, |start| *date >= start))
            .filter(|date| self.end_date.map_or(true, |end| *date < end))
            .collect())
    }

    fn validate(&self) -> Result<(), CliError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(CliError::InvalidArgument(format!(
                    "end date {end} is before start date {start}"
                )));
            }
        }
        Ok(())
    }
}

/// Enrich command arguments
#[derive(Parser, Debug)]
pub struct EnrichArgs {
    /// Dates to enrich
    #[command(flatten)]
    pub dates: DateSelection,
}

/// Export command arguments
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Dates to export
    #[command(flatten)]
    pub dates: DateSelection,
}

fn load_directory(layout: &StoreLayout) -> Result<(Users, Channels), CliError> {
    Ok((Users::load(layout)?, Channels::load(layout)?))
}

fn report(cli: &Cli, command: &str, days: &[(NaiveDate, usize)]) {
    match cli.output_format {
        OutputFormat::Json => {
            let days: Vec<_> = days
                .iter()
                .map(|(date, records)| serde_json::json!({"date": date, "records": records}))
                .collect();
            println!("{}", serde_json::json!({"command": command, "days": days}));
        }
        OutputFormat::Human => {
            let records: usize = days.iter().map(|(_, n)| n).sum();
            println!("{command}: {} day(s), {records} record(s)", days.len());
        }
    }
}

impl EnrichArgs {
    /// Enrich every selected `raw_threads` shard
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        self.dates.validate()?;
        let layout = StoreLayout::new(cli.store_root()?);
        let (users, channels) = load_directory(&layout)?;

        let mut days = Vec::new();
        for date in self.dates.dates(&layout, ShardKind::RawThreads)? {
            let written = render::enrich_day(&layout, date, &users, &channels)?;
            days.push((date, written));
        }
        info!(days = days.len(), "Enrichment finished");
        report(cli, "enrich", &days);
        Ok(())
    }
}

impl ExportArgs {
    /// Render every selected `enriched_messages` shard
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        self.dates.validate()?;
        let layout = StoreLayout::new(cli.store_root()?);
        let (users, channels) = load_directory(&layout)?;

        let mut days = Vec::new();
        for date in self.dates.dates(&layout, ShardKind::EnrichedMessages)? {
            let rendered = render::render_day(&layout, date, &users, &channels)?;
            days.push((date, rendered));
        }
        info!(days = days.len(), "Export finished");
        report(cli, "export", &days);
        Ok(())
    }
}
