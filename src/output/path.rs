//! Store layout
//!
//! All paths of a store derive from its root directory:
//!
//! ```text
//! <root>/status.json
//! <root>/sync.lock
//! <root>/users.jsonl
//! <root>/channels.jsonl
//! <root>/raw_messages/2020-04-09.jsonl
//! <root>/raw_threads/2020-04-09.jsonl
//! <root>/enriched_messages/2020-04-09.jsonl
//! <root>/org/2020-04-09.org
//! ```
//!
//! # Usage Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use slack_history_sync::output::{ShardKind, StoreLayout};
//! use std::path::PathBuf;
//!
//! let layout = StoreLayout::new("archive");
//! let date = NaiveDate::from_ymd_opt(2020, 4, 9).unwrap();
//! assert_eq!(
//!     layout.shard_path(ShardKind::RawThreads, date),
//!     PathBuf::from("archive/raw_threads/2020-04-09.jsonl")
//! );
//! ```

use super::{OutputError, OutputResult};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Kind of per-day artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShardKind {
    /// Filtered top-level messages
    RawMessages,
    /// Top-level messages with replies attached
    RawThreads,
    /// Thread records with user and channel names
    EnrichedMessages,
    /// Rendered org-mode export
    Org,
}

impl ShardKind {
    /// Every kind, in pipeline order
    pub const ALL: [ShardKind; 4] = [
        ShardKind::RawMessages,
        ShardKind::RawThreads,
        ShardKind::EnrichedMessages,
        ShardKind::Org,
    ];

    /// Directory name under the store root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::RawMessages => "raw_messages",
            Self::RawThreads => "raw_threads",
            Self::EnrichedMessages => "enriched_messages",
            Self::Org => "org",
        }
    }

    /// File extension of the shards
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Org => "org",
            _ => "jsonl",
        }
    }

    /// Whether shards hold JSON Lines records
    pub fn is_jsonl(&self) -> bool {
        self.extension() == "jsonl"
    }
}

/// Paths of a store rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checkpoint file
    pub fn status_path(&self) -> PathBuf {
        self.root.join("status.json")
    }

    /// Single-writer lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("sync.lock")
    }

    /// User directory snapshot
    pub fn users_path(&self) -> PathBuf {
        self.root.join("users.jsonl")
    }

    /// Channel directory snapshot
    pub fn channels_path(&self) -> PathBuf {
        self.root.join("channels.jsonl")
    }

    /// Directory holding shards of `kind`
    pub fn shard_dir(&self, kind: ShardKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Shard of `kind` for `date`
    pub fn shard_path(&self, kind: ShardKind, date: NaiveDate) -> PathBuf {
        self.shard_dir(kind).join(format!(
            "{}.{}",
            date.format(DATE_FORMAT),
            kind.extension()
        ))
    }

    /// Create the root and every shard directory
    pub fn ensure_dirs(&self) -> OutputResult<()> {
        for kind in ShardKind::ALL {
            std::fs::create_dir_all(self.shard_dir(kind))
                .map_err(|e| OutputError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    /// Dates that have a shard of `kind`, ascending
    ///
    /// Files whose name is not `<date>.<ext>` are ignored.
    pub fn list_shards(&self, kind: ShardKind) -> OutputResult<Vec<NaiveDate>> {
        let dir = self.shard_dir(kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OutputError::IoError(e.to_string())),
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OutputError::IoError(e.to_string()))?;
            if let Some(date) = parse_shard_name(&entry.path(), kind) {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }
}

fn parse_shard_name(path: &Path, kind: ShardKind) -> Option<NaiveDate> {
    if path.extension()?.to_str()? != kind.extension() {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}
