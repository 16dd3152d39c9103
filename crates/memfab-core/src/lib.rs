//! memfab core - tiered conversational memory
//!
//! Keeps three views of each user's conversation history:
//!
//! # Tiers
//!
//! - **recency** - bounded most-recent-first buffer of raw interactions
//! - **archive** - durable summaries of interactions that aged out of the buffer
//! - **semantic** - embedded, importance-weighted interactions for similarity search
//!
//! [`MemoryFabric`] fans writes out across the tiers and assembles
//! context from all three on reads.
//!
//! # Example
//!
//! ```rust,no_run
//! use memfab_core::{Collaborators, FabricConfig, MemoryFabric};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = FabricConfig::new("./vector_index");
//!     let fabric = MemoryFabric::new(config.clone(), Collaborators::in_memory(&config)?)?;
//!
//!     let report = fabric.add_interaction("user-123", "Prefers short answers", 0.8).await?;
//!     assert!(report.is_complete());
//!
//!     let context = fabric.retrieve_context("user-123", "answer style").await?;
//!     println!("{} recent, {} semantic", context.recent.len(), context.semantic.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod fabric;
pub mod index;
pub mod store;
pub mod summarizer;
pub mod tiers;
pub mod types;
pub mod utils;

pub use config::{ConfigValidationError, FabricConfig};
pub use embeddings::{Embedder, HashEmbedder};
#[cfg(feature = "embeddings")]
pub use embeddings::FastEmbedder;
pub use error::{FabricError, FabricResult};
pub use fabric::{Collaborators, MemoryFabric};
pub use store::{InMemoryListStore, ListStore, SqliteListStore};
pub use summarizer::{JoinSummarizer, Summarizer};
pub use tiers::{ArchiveStore, RecencyBuffer, SemanticIndex, SemanticTier};
pub use types::{
    FabricStats, Interaction, MemoryRecord, RetrievedContext, SemanticHit, StepOutcome, Summary, Tier,
    WriteReport,
};
