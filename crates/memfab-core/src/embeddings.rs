//! Embedding Service for the Semantic Tier
//!
//! The semantic tier only needs `embed(texts) -> vectors` with a fixed
//! dimensionality. Two implementations ship with the crate:
//!
//! - [`HashEmbedder`]: deterministic feature hashing over word tokens.
//!   No model download, identical texts always collide exactly, shared
//!   words raise similarity. Good enough for tests and offline use.
//! - `FastEmbedder` (feature `embeddings`): local inference with
//!   `fastembed` using all-MiniLM-L6-v2 (384 dimensions).
//!
//! Vectors are unit-normalized by the semantic tier before indexing, so an
//! inner product over them is cosine similarity.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{FabricError, FabricResult};

/// Default embedding dimensionality
pub const EMBEDDING_DIM_DEFAULT: usize = 768;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const MINILM_DIMENSIONS: usize = 384;

/// Text embedding collaborator
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Model identifier, for logs
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per text in input order
    async fn embed(&self, texts: &[String]) -> FabricResult<Vec<Vec<f32>>>;
}

/// Embed a single text
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> FabricResult<Vec<f32>> {
    let vectors = embedder.embed(&[text.to_string()]).await?;
    let vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| FabricError::embedding("No embedding generated"))?;

    if vector.len() != embedder.dimension() {
        return Err(FabricError::embedding(format!(
            "{} returned {} dimensions, expected {}",
            embedder.model_name(),
            vector.len(),
            embedder.dimension()
        )));
    }
    Ok(vector)
}

/// Scale `v` to unit length in place; the zero vector is left alone
pub fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute cosine similarity between two vectors
///
/// Returns a value between -1.0 and 1.0; mismatched lengths or zero
/// vectors give 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Deterministic feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        normalize_l2(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM_DEFAULT)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }

    async fn embed(&self, texts: &[String]) -> FabricResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Local embedding model backed by `fastembed`
#[cfg(feature = "embeddings")]
pub struct FastEmbedder {
    model: std::sync::Arc<tokio::sync::RwLock<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "embeddings")]
impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl FastEmbedder {
    pub fn new() -> Self {
        Self {
            model: std::sync::Arc::new(tokio::sync::RwLock::new(None)),
        }
    }

    /// Initialize the embedding model (lazy loading)
    async fn ensure_model(&self) -> FabricResult<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        if self.model.read().await.is_some() {
            return Ok(());
        }

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::AllMiniLML6V2;
        init_options.show_download_progress = false;

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| FabricError::embedding(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());

        *model_guard = Some(model);
        Ok(())
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    fn dimension(&self) -> usize {
        MINILM_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    async fn embed(&self, texts: &[String]) -> FabricResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| FabricError::embedding("Embedding model not initialized"))?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| FabricError::embedding(format!("Failed to generate embeddings: {}", e)))
    }
}
