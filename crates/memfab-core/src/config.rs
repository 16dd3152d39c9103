//! Fabric Configuration
//!
//! Defines configuration options for the memory fabric.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Memory fabric configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Recency buffer capacity per user (default: 200)
    pub max_items: usize,

    /// Significance above which an interaction is promoted (default: 0.7)
    pub promotion_threshold: f64,

    /// Importance half-life in hours (default: 48)
    pub half_life_hours: f64,

    /// Summaries returned per retrieval (default: 5)
    pub archive_limit: usize,

    /// Semantic hits returned per retrieval (default: 5)
    pub query_k: usize,

    /// Embedding dimensionality (default: 768)
    pub embedding_dim: usize,

    /// Directory holding per-user index and metadata files
    pub index_dir: PathBuf,

    /// Key prefix for recency lists (default: "micro:")
    pub recency_prefix: String,

    /// Key prefix for summarization cursors (default: "micro-cursor:")
    pub cursor_prefix: String,

    /// Bound on every store call in milliseconds (default: 2000)
    pub store_timeout_ms: u64,

    /// Connections per SQLite pool (default: 4)
    pub pool_size: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            max_items: 200,
            promotion_threshold: 0.7,
            half_life_hours: 48.0,
            archive_limit: 5,
            query_k: 5,
            embedding_dim: 768,
            index_dir: PathBuf::from("./vector_index"),
            recency_prefix: "micro:".into(),
            cursor_prefix: "micro-cursor:".into(),
            store_timeout_ms: 2000,
            pool_size: 4,
        }
    }
}

impl FabricConfig {
    /// Create a config rooted at the given index directory
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            ..Default::default()
        }
    }

    /// Set the recency buffer capacity
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Set the promotion threshold
    pub fn with_promotion_threshold(mut self, threshold: f64) -> Self {
        self.promotion_threshold = threshold;
        self
    }

    /// Set the decay half-life
    pub fn with_half_life_hours(mut self, hours: f64) -> Self {
        self.half_life_hours = hours;
        self
    }

    /// Set the embedding dimensionality
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Set the store timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Store timeout as a `Duration`
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_items == 0 {
            return Err(invalid("max_items", "must be greater than 0"));
        }

        if !self.promotion_threshold.is_finite()
            || self.promotion_threshold < 0.0
            || self.promotion_threshold >= 1.0
        {
            return Err(invalid("promotion_threshold", "must be in [0, 1)"));
        }

        if !self.half_life_hours.is_finite() || self.half_life_hours <= 0.0 {
            return Err(invalid("half_life_hours", "must be a positive number"));
        }

        if self.embedding_dim == 0 {
            return Err(invalid("embedding_dim", "must be greater than 0"));
        }

        if self.store_timeout_ms == 0 {
            return Err(invalid("store_timeout_ms", "must be greater than 0"));
        }

        if self.pool_size == 0 {
            return Err(invalid("pool_size", "must be greater than 0"));
        }

        // Keys are prefix + user_id; if one prefix starts the other, some
        // user's list key equals another user's cursor key
        if self.recency_prefix.starts_with(&self.cursor_prefix)
            || self.cursor_prefix.starts_with(&self.recency_prefix)
        {
            return Err(invalid("cursor_prefix", "must not share a leading prefix with recency_prefix"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
