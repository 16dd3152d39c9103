//! Memory Type Definitions
//!
//! Defines the records held by each tier and the result shapes returned by
//! the orchestrator.

use serde::{Deserialize, Serialize};

/// Memory tier (recency, archive, semantic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Recency,
    Archive,
    Semantic,
}

impl Tier {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recency" | "micro" => Some(Self::Recency),
            "archive" | "meso" => Some(Self::Archive),
            "semantic" | "macro" => Some(Self::Semantic),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recency => "recency",
            Self::Archive => "archive",
            Self::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw interaction held by the recency buffer.
///
/// `seq` increases by one per user on every add and is what the
/// summarization cursor is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub text: String,
    #[serde(rename = "ts")]
    pub timestamp: f64,
    #[serde(default)]
    pub seq: u64,
}

/// A condensed block of interactions held by the archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: f64,
    pub last_access: f64,
}

/// A promoted interaction held by a user's semantic index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    /// Creation time, the fixed reference for decay
    #[serde(rename = "ts")]
    pub timestamp: f64,
    /// Current (decayed) weight in (0, 1]
    pub importance: f64,
    /// Weight at promotion time; zero in files written before it was tracked
    #[serde(default)]
    pub base_importance: f64,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>, timestamp: f64, importance: f64) -> Self {
        Self {
            text: text.into(),
            timestamp,
            importance,
            base_importance: importance,
        }
    }
}

/// A semantic-tier search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub text: String,
    /// Raw cosine similarity from the index
    pub similarity: f32,
    /// Record importance at query time
    pub importance: f64,
    /// `similarity * importance`, the ranking key
    pub score: f64,
    pub timestamp: f64,
}

/// Context fetched from all three tiers, kept as separate blocks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Recency buffer, most-recent-first
    pub recent: Vec<String>,
    /// Archive summaries by last access
    pub summaries: Vec<String>,
    /// Semantic hits by descending score
    pub semantic: Vec<SemanticHit>,
}

impl RetrievedContext {
    /// Semantic hit texts in rank order
    pub fn semantic_texts(&self) -> Vec<&str> {
        self.semantic.iter().map(|h| h.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty() && self.summaries.is_empty() && self.semantic.is_empty()
    }
}

/// Outcome of one optional step of a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step conditions were not met
    Skipped,
    /// Step ran and its tier accepted the write
    Completed,
    /// Step ran and failed; earlier steps are not rolled back
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Per-step result of `add_interaction`.
///
/// Buffering is mandatory: if it fails the call returns an error and no
/// report is produced, so a report always means the buffer holds the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub user_id: String,
    /// Sequence number assigned by the recency buffer
    pub seq: u64,
    pub promotion: StepOutcome,
    pub summarization: StepOutcome,
}

impl WriteReport {
    /// True when no step failed
    pub fn is_complete(&self) -> bool {
        !self.promotion.is_failed() && !self.summarization.is_failed()
    }
}

/// Per-user counts across tiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricStats {
    pub recent: usize,
    pub summaries: usize,
    pub semantic_records: usize,
    /// Newest interaction covered by a summary
    pub summarized_through: u64,
}
