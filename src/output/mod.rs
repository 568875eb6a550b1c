//! Dated shard storage
//!
//! Every artifact of a day lives in its own file under a per-kind directory
//! (see [`path::StoreLayout`]). Shards are JSON Lines written with an atomic
//! rename, see [`jsonl`].

use std::path::PathBuf;

pub mod jsonl;
pub mod path;

pub use path::{ShardKind, StoreLayout};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The requested shard has never been written
    #[error("shard not found: {}", .0.display())]
    ShardNotFound(PathBuf),

    /// A shard line is not a valid record
    #[error("corrupt shard {path} at line {line}: {message}")]
    CorruptShard {
        /// Shard location
        path: String,
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
