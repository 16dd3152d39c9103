//! The three memory tiers.
//!
//! - [`RecencyBuffer`]: bounded most-recent-first log of raw interactions
//! - [`ArchiveStore`]: durable summaries ranked by last access
//! - [`SemanticTier`]: per-user similarity index with decaying importance
//!
//! Each tier is usable on its own; [`crate::MemoryFabric`] composes them.

mod archive;
mod recency;
mod semantic;

pub use archive::ArchiveStore;
pub use recency::{BufferedWrite, RecencyBuffer};
pub use semantic::{SemanticIndex, SemanticTier};
