//! Checkpoint persistence
//!
//! The status file is a flat JSON object keyed by ISO date. Every change is
//! written through immediately with an atomic temp-file rename under an
//! advisory lock, so a crash leaves either the old or the new record.

use super::checkpoint::{CheckpointEntry, SyncFlag};
use chrono::NaiveDate;
use fd_lock::RwLock;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum allowed status file size (10 MB) to prevent memory exhaustion
pub const MAX_STATE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Per-date completion flags backed by a JSON file
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: BTreeMap<NaiveDate, CheckpointEntry>,
}

impl CheckpointStore {
    /// Load the store at `path`; a missing file is an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ResumeError> {
        let path = path.into();

        if !path.exists() {
            debug!(path = %path.display(), "No status file yet, starting empty");
            return Ok(Self {
                path,
                entries: BTreeMap::new(),
            });
        }

        let lock_file = open_lock_file(&path)?;
        debug!("Acquiring read lock for status file");
        let lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire read lock: {e}")))?;

        let metadata = std::fs::metadata(&path).map_err(|e| ResumeError::IoError(e.to_string()))?;
        if metadata.len() > MAX_STATE_FILE_SIZE {
            return Err(ResumeError::StateTooLarge {
                size: metadata.len(),
                max: MAX_STATE_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(&path).map_err(|e| ResumeError::IoError(e.to_string()))?;
        let entries: BTreeMap<NaiveDate, CheckpointEntry> = if contents.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                warn!(error = %e, path = %path.display(), "Failed to deserialize status file");
                ResumeError::DeserializationError(e.to_string())
            })?
        };

        info!(
            path = %path.display(),
            dates = entries.len(),
            "Status loaded"
        );
        Ok(Self { path, entries })
    }

    /// Location of the status file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry of `date`; absent dates read as both flags `false`
    pub fn entry(&self, date: NaiveDate) -> CheckpointEntry {
        self.entries.get(&date).copied().unwrap_or_default()
    }

    /// Whether `flag` is set for `date`
    pub fn is_complete(&self, date: NaiveDate, flag: SyncFlag) -> bool {
        self.entry(date).is_complete(flag)
    }

    /// All recorded dates in ascending order
    pub fn entries(&self) -> impl Iterator<Item = (NaiveDate, CheckpointEntry)> + '_ {
        self.entries.iter().map(|(date, entry)| (*date, *entry))
    }

    /// Make sure `date` has an entry, persisting a fresh one if needed
    pub fn record_attempt(&mut self, date: NaiveDate) -> Result<(), ResumeError> {
        if self.entries.contains_key(&date) {
            return Ok(());
        }
        self.entries.insert(date, CheckpointEntry::default());
        self.save()
    }

    /// Set `flag` for `date` and persist
    pub fn mark_complete(&mut self, date: NaiveDate, flag: SyncFlag) -> Result<(), ResumeError> {
        let entry = self.entries.entry(date).or_default();
        if entry.is_complete(flag) {
            return Ok(());
        }
        entry.mark_complete(flag);
        info!(%date, %flag, "Day frozen");
        self.save()
    }

    /// Write the store to disk atomically
    ///
    /// Uses tempfile::NamedTempFile for the atomic rename and fd-lock to
    /// serialize concurrent writers.
    pub fn save(&self) -> Result<(), ResumeError> {
        let path = &self.path;
        debug!(path = %path.display(), dates = self.entries.len(), "Saving status");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;

        let lock_file = open_lock_file(path)?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

        let parent_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;

        // Flush and sync before the rename so the new content is durable.
        temp_file
            .flush()
            .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(path)
            .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

        // The new content is already in place; only its durability is at stake.
        if let Err(e) = sync_directory(parent_dir) {
            warn!(
                path = %parent_dir.display(),
                error = %e,
                "Failed to sync status directory after rename"
            );
        }

        Ok(())
    }
}

/// Flush a directory entry table to disk
fn sync_directory(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

fn open_lock_file(path: &Path) -> Result<File, ResumeError> {
    let lock_path = path.with_extension("lock");
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| ResumeError::LockError(format!("Failed to create lock file: {e}")))
}

/// Errors related to checkpoint persistence
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// State file too large
    #[error("status file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),

    /// Another sync holds the store
    #[error("another sync is already running on {0}")]
    AlreadyRunning(String),
}
