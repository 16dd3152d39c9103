//! Recency buffer (micro tier).
//!
//! One list per user in the [`ListStore`], head = newest. Every add pushes
//! then trims back to `max_items`, so the list never holds more than the
//! capacity after a write completes.
//!
//! Alongside each list the buffer keeps a summarization cursor: the `seq`
//! of the newest interaction already folded into an archive summary.
//! Interactions with a higher `seq` are still pending.

use std::sync::Arc;
use std::time::Duration;

use crate::config::FabricConfig;
use crate::error::FabricResult;
use crate::store::{ListStore, with_timeout};
use crate::types::{Interaction, Tier};
use crate::utils::Clock;

/// Result of a buffer add
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedWrite {
    pub interaction: Interaction,
    /// Buffer length after the trim
    pub len: usize,
    /// Entries dropped off the tail by this add
    pub evicted: usize,
}

/// Bounded per-user FIFO of raw interactions
pub struct RecencyBuffer {
    store: Arc<dyn ListStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    cursor_prefix: String,
    max_items: usize,
    timeout: Duration,
}

impl RecencyBuffer {
    pub fn new(store: Arc<dyn ListStore>, clock: Arc<dyn Clock>, config: &FabricConfig) -> Self {
        Self {
            store,
            clock,
            prefix: config.recency_prefix.clone(),
            cursor_prefix: config.cursor_prefix.clone(),
            max_items: config.max_items,
            timeout: config.store_timeout(),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}{}", self.prefix, user_id)
    }

    fn cursor_key(&self, user_id: &str) -> String {
        format!("{}{}", self.cursor_prefix, user_id)
    }

    /// Insert `text` at the head, evicting from the tail beyond capacity.
    ///
    /// The sequence number follows the highest one in the buffer or the
    /// summarization cursor, so concurrent adds for one user must be
    /// serialized by the caller.
    pub async fn add(&self, user_id: &str, text: &str) -> FabricResult<BufferedWrite> {
        let key = self.key(user_id);

        let newest = self.entries(user_id).await?.iter().map(|i| i.seq).max().unwrap_or(0);
        let seq = newest.max(self.summarized_through(user_id).await?) + 1;

        let interaction = Interaction {
            text: text.to_string(),
            timestamp: self.clock.now(),
            seq,
        };
        let value = serde_json::to_string(&interaction)?;

        let pushed = with_timeout(Tier::Recency, self.timeout, self.store.push(&key, &value)).await?;
        with_timeout(
            Tier::Recency,
            self.timeout,
            self.store.trim(&key, 0, self.max_items as i64 - 1),
        )
        .await?;

        let evicted = pushed.saturating_sub(self.max_items);
        tracing::debug!(user_id = %user_id, seq, len = pushed.min(self.max_items), evicted, "Buffered interaction");

        Ok(BufferedWrite {
            interaction,
            len: pushed.min(self.max_items),
            evicted,
        })
    }

    /// Buffered texts, most recent first; empty for an unknown user
    pub async fn get_all(&self, user_id: &str) -> FabricResult<Vec<String>> {
        Ok(self
            .entries(user_id)
            .await?
            .into_iter()
            .map(|i| i.text)
            .collect())
    }

    /// Buffered interactions, most recent first
    pub async fn entries(&self, user_id: &str) -> FabricResult<Vec<Interaction>> {
        self.slice(user_id, 0, self.max_items as i64 - 1).await
    }

    /// The entry next in line for eviction
    pub async fn oldest(&self, user_id: &str) -> FabricResult<Option<Interaction>> {
        Ok(self.slice(user_id, -1, -1).await?.into_iter().next())
    }

    async fn slice(&self, user_id: &str, start: i64, stop: i64) -> FabricResult<Vec<Interaction>> {
        let key = self.key(user_id);
        let raw = with_timeout(Tier::Recency, self.timeout, self.store.range(&key, start, stop)).await?;
        Ok(raw.into_iter().map(|value| decode(&value)).collect())
    }

    /// Sequence number of the newest summarized interaction (0 if none)
    pub async fn summarized_through(&self, user_id: &str) -> FabricResult<u64> {
        let key = self.cursor_key(user_id);
        let raw = with_timeout(Tier::Recency, self.timeout, self.store.range(&key, 0, 0)).await?;
        Ok(raw.first().and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Record that everything up to `seq` has been summarized
    pub async fn set_summarized_through(&self, user_id: &str, seq: u64) -> FabricResult<()> {
        let key = self.cursor_key(user_id);
        with_timeout(Tier::Recency, self.timeout, self.store.push(&key, &seq.to_string())).await?;
        with_timeout(Tier::Recency, self.timeout, self.store.trim(&key, 0, 0)).await
    }

    /// Buffered interactions not yet covered by a summary, oldest first
    pub async fn pending_summary(&self, user_id: &str) -> FabricResult<Vec<Interaction>> {
        let cursor = self.summarized_through(user_id).await?;
        let mut pending: Vec<Interaction> = self
            .entries(user_id)
            .await?
            .into_iter()
            .filter(|i| i.seq > cursor)
            .collect();
        pending.reverse();
        Ok(pending)
    }
}

/// Decode a stored entry; values written by other tools are taken as bare text
fn decode(value: &str) -> Interaction {
    serde_json::from_str(value).unwrap_or_else(|_| {
        tracing::debug!("Recency entry is not JSON, treating as bare text");
        Interaction {
            text: value.to_string(),
            timestamp: 0.0,
            seq: 0,
        }
    })
}
