//! Enrichment and export rendering
//!
//! Runs after a sync over the `raw_threads` shards:
//!
//! 1. [`enrich::enrich_day`] adds user and channel names to every record and
//!    writes the `enriched_messages` shard.
//! 2. [`org::render_day`] renders the enriched shard to `org/<date>.org`,
//!    using [`blocks::BlockRenderer`] for message bodies.
//!
//! Unknown users and channels render as their raw ids.

pub mod blocks;
pub mod enrich;
pub mod org;

pub use blocks::BlockRenderer;
pub use enrich::{enrich_day, EnrichedMessage};
pub use org::render_day;
