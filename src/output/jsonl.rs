//! JSON Lines shard reader and writer
//!
//! One record per line, each line terminated by `\n`. Writes go to a temp
//! file in the target directory which is synced and renamed over the shard,
//! so readers see either the previous shard or the complete new one.

use super::{OutputError, OutputResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::debug;

/// Replace the shard at `path` with `records`
///
/// Zero records produce an empty file. Returns the number of records written.
pub fn write_day<T: Serialize>(path: &Path, records: &[T]) -> OutputResult<usize> {
    let mut buffer = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buffer, record)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        buffer.push(b'\n');
    }

    write_atomic(path, &buffer)?;
    debug!(path = %path.display(), records = records.len(), "Shard written");
    Ok(records.len())
}

/// Records of the shard at `path`, in file order
///
/// Blank lines are skipped. A missing file is [`OutputError::ShardNotFound`].
pub fn read_day<T: DeserializeOwned>(path: &Path) -> OutputResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OutputError::ShardNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(OutputError::IoError(e.to_string())),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| OutputError::IoError(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| OutputError::CorruptShard {
            path: path.display().to_string(),
            line: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Replace the file at `path` with `contents` via temp file and rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> OutputResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| OutputError::IoError(e.to_string()))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
    temp_file
        .write_all(contents)
        .map_err(|e| OutputError::IoError(format!("Failed to write temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

    Ok(())
}
