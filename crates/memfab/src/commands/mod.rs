//! Command implementations for the memfab CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod doctor;
pub mod maintain;
pub mod memory;

use std::sync::Arc;

use anyhow::{Context, Result};
use memfab_core::{Collaborators, Embedder, HashEmbedder, MemoryFabric};

use crate::config::{Config, EmbedderKind};

/// Build the embedder selected in the config
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedder {
        EmbedderKind::Hash => Ok(Arc::new(HashEmbedder::new(config.fabric.embedding_dim))),
        #[cfg(feature = "embeddings")]
        EmbedderKind::Fastembed => Ok(Arc::new(memfab_core::FastEmbedder::new())),
        #[cfg(not(feature = "embeddings"))]
        EmbedderKind::Fastembed => {
            anyhow::bail!("memfab was built without the `embeddings` feature; use embedder = \"hash\"")
        }
    }
}

/// Open the fabric described by `config`, creating directories as needed
pub fn open_fabric(config: &Config) -> Result<MemoryFabric> {
    config.ensure_dirs()?;

    let embedder = build_embedder(config)?;
    let mut fabric_config = config.fabric.clone();
    if fabric_config.embedding_dim != embedder.dimension() {
        tracing::debug!(
            configured = fabric_config.embedding_dim,
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "Using embedder dimension"
        );
        fabric_config.embedding_dim = embedder.dimension();
    }

    let parts = Collaborators::open(&fabric_config, &config.paths.database)
        .context("Failed to open database")?
        .with_embedder(embedder);

    MemoryFabric::new(fabric_config, parts).context("Failed to initialize memory fabric")
}
