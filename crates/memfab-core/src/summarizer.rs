//! Summarization collaborator.
//!
//! The archive tier stores whatever a [`Summarizer`] condenses a batch of
//! interactions into. Wire an LLM-backed implementation in production;
//! [`JoinSummarizer`] keeps every text verbatim.

use async_trait::async_trait;

use crate::error::{FabricError, FabricResult};

/// Condenses a batch of texts (oldest first) into one summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, texts: &[String]) -> FabricResult<String>;
}

/// Joins texts with a separator
#[derive(Debug, Clone)]
pub struct JoinSummarizer {
    separator: String,
}

impl JoinSummarizer {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl Default for JoinSummarizer {
    fn default() -> Self {
        Self::new(" | ")
    }
}

#[async_trait]
impl Summarizer for JoinSummarizer {
    async fn summarize(&self, texts: &[String]) -> FabricResult<String> {
        if texts.is_empty() {
            return Err(FabricError::summarization("nothing to summarize"));
        }
        Ok(texts.join(&self.separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_summarizer() {
        let summarizer = JoinSummarizer::default();
        let summary = tokio_test::block_on(summarizer.summarize(&["a".into(), "b".into(), "c".into()]))
            .unwrap();
        assert_eq!(summary, "a | b | c");
    }

    #[test]
    fn test_join_summarizer_rejects_empty_batch() {
        let summarizer = JoinSummarizer::new("\n");
        let err = tokio_test::block_on(summarizer.summarize(&[])).unwrap_err();
        assert!(matches!(err, FabricError::Summarization { .. }));
    }
}
