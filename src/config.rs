//! Configuration file
//!
//! Read from `<config_dir>/slack-history-sync/config.toml`:
//!
//! ```toml
//! storage_location = "/data/slack"
//! start_date = 2020-04-09
//! end_date = "2020-05-01"
//! threads_lookback_working_days = 2
//! ```
//!
//! `database_directory` is accepted as an alias of `storage_location`.
//! Dates may be TOML dates or `YYYY-MM-DD` strings. Command line flags
//! override every key.

use crate::calendar;
use crate::sync::config::DEFAULT_THREADS_LOOKBACK_WORKING_DAYS;
use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "slack-history-sync";
const CONFIG_FILE: &str = "config.toml";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {message}")]
    Io {
        /// Config location
        path: String,
        /// OS message
        message: String,
    },

    /// File is not valid TOML or has wrong types
    #[error("failed to parse config {path}: {message}")]
    Parse {
        /// Config location
        path: String,
        /// Parser message
        message: String,
    },

    /// A required key is set neither in the file nor on the command line
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// Settings contradict each other
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings as written in the file, every key optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Store root
    #[serde(default, alias = "database_directory")]
    pub storage_location: Option<PathBuf>,
    /// First date synced
    #[serde(default, deserialize_with = "deserialize_date")]
    pub start_date: Option<NaiveDate>,
    /// First date not synced
    #[serde(default, deserialize_with = "deserialize_date")]
    pub end_date: Option<NaiveDate>,
    /// Working days during which threads are re-checked
    #[serde(default)]
    pub threads_lookback_working_days: Option<u32>,
}

/// Settings of a sync run after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Store root
    pub storage_location: PathBuf,
    /// First date synced
    pub start_date: NaiveDate,
    /// First date not synced
    pub end_date: NaiveDate,
    /// Working days during which threads are re-checked
    pub threads_lookback_working_days: u32,
}

impl SyncConfig {
    /// Default config location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load `path`; a missing file is an empty configuration
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Values of `overrides` win where set
    pub fn merge(self, overrides: SyncConfig) -> Self {
        Self {
            storage_location: overrides.storage_location.or(self.storage_location),
            start_date: overrides.start_date.or(self.start_date),
            end_date: overrides.end_date.or(self.end_date),
            threads_lookback_working_days: overrides
                .threads_lookback_working_days
                .or(self.threads_lookback_working_days),
        }
    }

    /// Apply defaults relative to `today`
    ///
    /// `end_date` defaults to the day after `today`, the lookback to
    /// [`DEFAULT_THREADS_LOOKBACK_WORKING_DAYS`].
    pub fn resolve(self, today: NaiveDate) -> Result<ResolvedConfig, ConfigError> {
        let storage_location = self
            .storage_location
            .ok_or(ConfigError::Missing("storage_location"))?;
        let start_date = self.start_date.ok_or(ConfigError::Missing("start_date"))?;
        let end_date = self.end_date.unwrap_or_else(|| calendar::next_day(today));

        if end_date < start_date {
            return Err(ConfigError::Invalid(format!(
                "end_date {end_date} is before start_date {start_date}"
            )));
        }

        Ok(ResolvedConfig {
            storage_location,
            start_date,
            end_date,
            threads_lookback_working_days: self
                .threads_lookback_working_days
                .unwrap_or(DEFAULT_THREADS_LOOKBACK_WORKING_DAYS),
        })
    }
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<toml::Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(toml::Value::Datetime(datetime)) => {
            let date = datetime
                .date
                .ok_or_else(|| D::Error::custom("expected a date, found a bare time"))?;
            NaiveDate::from_ymd_opt(date.year.into(), date.month.into(), date.day.into())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date {datetime}")))
        }
        Some(toml::Value::String(text)) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid date {text:?}: {e}"))),
        Some(other) => Err(D::Error::custom(format!(
            "expected a date, found {}",
            other.type_str()
        ))),
    }
}
