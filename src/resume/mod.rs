//! Resume capability for sync runs
//!
//! Provides per-day checkpoint persistence with atomic writes and file locking.

pub mod checkpoint;
pub mod lock;
pub mod state;

pub use checkpoint::{CheckpointEntry, FlagState, SyncFlag};
pub use lock::SyncLock;
pub use state::{CheckpointStore, ResumeError};
