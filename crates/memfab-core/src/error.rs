//! Fabric Error Types
//!
//! Defines error types for the memory fabric.

use thiserror::Error;

use crate::types::Tier;

/// Fabric Result type alias
pub type FabricResult<T> = Result<T, FabricError>;

/// Memory fabric errors
#[derive(Debug, Error)]
pub enum FabricError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// A backing store could not be reached, or did not answer in time
    #[error("{tier} tier unavailable: {message}")]
    TierUnavailable { tier: Tier, message: String },

    /// Index and metadata disagree for a user
    #[error("corrupt metadata for user {user_id}: {message}")]
    CorruptMetadata { user_id: String, message: String },

    /// Rejected before any tier was touched
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Embedding collaborator failure
    #[error("embedding error: {message}")]
    Embedding { message: String },

    /// Summarization collaborator failure
    #[error("summarization error: {message}")]
    Summarization { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl FabricError {
    /// Create a tier-unavailable error
    pub fn tier_unavailable(tier: Tier, message: impl Into<String>) -> Self {
        Self::TierUnavailable {
            tier,
            message: message.into(),
        }
    }

    /// Create a timeout error for a tier
    pub fn timeout(tier: Tier, duration_ms: u64) -> Self {
        Self::tier_unavailable(tier, format!("operation timed out after {}ms", duration_ms))
    }

    /// Create a corrupt metadata error
    pub fn corrupt_metadata(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptMetadata {
            user_id: user_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a summarization error
    pub fn summarization(message: impl Into<String>) -> Self {
        Self::Summarization {
            message: message.into(),
        }
    }

    /// Wrap a database error as an outage of the given tier
    pub fn database(tier: Tier, err: rusqlite::Error) -> Self {
        Self::tier_unavailable(tier, err.to_string())
    }

    /// Check if this error is a tier outage
    pub fn is_tier_unavailable(&self) -> bool {
        matches!(self, Self::TierUnavailable { .. })
    }

    /// Check if this error is an input rejection
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Check if this error is a corrupt metadata error
    pub fn is_corrupt_metadata(&self) -> bool {
        matches!(self, Self::CorruptMetadata { .. })
    }

    /// The tier this error is attributed to, if any
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::TierUnavailable { tier, .. } => Some(*tier),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = FabricError::tier_unavailable(Tier::Archive, "connection refused");
        assert!(err.is_tier_unavailable());
        assert_eq!(err.tier(), Some(Tier::Archive));
        assert!(err.to_string().contains("archive"));
        assert!(err.to_string().contains("connection refused"));

        let err = FabricError::timeout(Tier::Recency, 2000);
        assert!(err.is_tier_unavailable());
        assert!(err.to_string().contains("2000"));

        let err = FabricError::invalid_input("text must not be empty");
        assert!(err.is_invalid_input());
        assert_eq!(err.tier(), None);

        let err = FabricError::corrupt_metadata("alice", "3 vectors, 2 records");
        assert!(err.is_corrupt_metadata());
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_database_error_maps_to_tier() {
        let err = FabricError::database(Tier::Archive, rusqlite::Error::InvalidQuery);
        assert!(err.is_tier_unavailable());
        assert_eq!(err.tier(), Some(Tier::Archive));
    }
}
