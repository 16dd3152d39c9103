//! Memory Fabric Orchestrator
//!
//! Composes the three tiers behind two calls:
//!
//! - [`MemoryFabric::add_interaction`]: buffer, maybe promote, maybe summarize
//! - [`MemoryFabric::retrieve_context`]: read all three tiers for a query
//!
//! Writes run as a saga. Buffering must succeed or the call fails; the
//! promotion and summarization steps that follow are each attempted once,
//! and their outcome is reported in the [`WriteReport`] instead of undoing
//! earlier steps. Writes for one user are serialized; different users never
//! wait on each other.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::config::FabricConfig;
use crate::db::SqlitePool;
use crate::embeddings::{Embedder, HashEmbedder};
use crate::error::{FabricError, FabricResult};
use crate::store::{InMemoryListStore, ListStore, SqliteListStore};
use crate::summarizer::{JoinSummarizer, Summarizer};
use crate::tiers::{ArchiveStore, RecencyBuffer, SemanticTier};
use crate::types::{FabricStats, RetrievedContext, StepOutcome, Summary, Tier, WriteReport};
use crate::utils::{Clock, SystemClock, validate_significance, validate_text, validate_user_id};

/// The backing stores and services a fabric is built from
pub struct Collaborators {
    pub list_store: Arc<dyn ListStore>,
    pub pool: Arc<SqlitePool>,
    pub embedder: Arc<dyn Embedder>,
    pub summarizer: Arc<dyn Summarizer>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// SQLite database at `path` for both durable stores
    pub fn open(config: &FabricConfig, path: &Path) -> FabricResult<Self> {
        let pool = SqlitePool::open(path, config.pool_size, config.store_timeout())
            .map_err(|e| FabricError::tier_unavailable(Tier::Archive, e.to_string()))?;
        let pool = Arc::new(pool);

        Ok(Self {
            list_store: Arc::new(SqliteListStore::new(pool.clone())),
            pool,
            embedder: Arc::new(HashEmbedder::new(config.embedding_dim)),
            summarizer: Arc::new(JoinSummarizer::default()),
            clock: Arc::new(SystemClock),
        })
    }

    /// Nothing durable except the semantic index directory
    pub fn in_memory(config: &FabricConfig) -> FabricResult<Self> {
        let pool = SqlitePool::open_in_memory(config.store_timeout())
            .map_err(|e| FabricError::tier_unavailable(Tier::Archive, e.to_string()))?;

        Ok(Self {
            list_store: Arc::new(InMemoryListStore::new()),
            pool: Arc::new(pool),
            embedder: Arc::new(HashEmbedder::new(config.embedding_dim)),
            summarizer: Arc::new(JoinSummarizer::default()),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_list_store(mut self, list_store: Arc<dyn ListStore>) -> Self {
        self.list_store = list_store;
        self
    }
}

/// Three-tier conversational memory, partitioned by user
///
/// # Example
///
/// ```rust,no_run
/// use memfab_core::{Collaborators, FabricConfig, MemoryFabric};
///
/// async fn example() -> anyhow::Result<()> {
///     let config = FabricConfig::new("./vector_index");
///     let parts = Collaborators::open(&config, "memfab.db".as_ref())?;
///     let fabric = MemoryFabric::new(config, parts)?;
///
///     fabric.add_interaction("user-123", "Deploys go out on Tuesdays", 0.9).await?;
///     let context = fabric.retrieve_context("user-123", "when do we deploy?").await?;
///     println!("{:?}", context.semantic_texts());
///
///     Ok(())
/// }
/// ```
pub struct MemoryFabric {
    config: FabricConfig,
    recency: RecencyBuffer,
    archive: ArchiveStore,
    semantic: SemanticTier,
    summarizer: Arc<dyn Summarizer>,
    pool: Arc<SqlitePool>,
    write_gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MemoryFabric {
    /// Create a fabric
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The embedder's dimension differs from `embedding_dim`
    pub fn new(config: FabricConfig, parts: Collaborators) -> FabricResult<Self> {
        config.validate()?;

        if parts.embedder.dimension() != config.embedding_dim {
            return Err(FabricError::invalid_input(format!(
                "embedder {} produces {} dimensions, config expects {}",
                parts.embedder.model_name(),
                parts.embedder.dimension(),
                config.embedding_dim
            )));
        }

        let recency = RecencyBuffer::new(parts.list_store, parts.clock.clone(), &config);
        let archive = ArchiveStore::new(parts.pool.clone(), parts.clock.clone(), config.store_timeout());
        let semantic = SemanticTier::new(config.index_dir.clone(), parts.embedder.clone(), parts.clock);

        tracing::info!(
            max_items = config.max_items,
            index_dir = %config.index_dir.display(),
            model = parts.embedder.model_name(),
            "Memory fabric ready"
        );

        Ok(Self {
            config,
            recency,
            archive,
            semantic,
            summarizer: parts.summarizer,
            pool: parts.pool,
            write_gates: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    pub fn recency(&self) -> &RecencyBuffer {
        &self.recency
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    pub fn semantic(&self) -> &SemanticTier {
        &self.semantic
    }

    fn write_gate(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        self.write_gates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget `gate` once no other call holds or waits on it
    fn release_gate(&self, user_id: &str, gate: Arc<AsyncMutex<()>>) {
        let mut gates = self.write_gates.lock().unwrap_or_else(|e| e.into_inner());
        // one reference in the map, one here
        if Arc::strong_count(&gate) <= 2 {
            gates.remove(user_id);
        }
    }

    /// Record an interaction.
    ///
    /// The text is always buffered. It is promoted to the semantic index
    /// when `significance` exceeds the promotion threshold, with importance
    /// `min(significance, 1.0)`. When the buffer is full and its oldest
    /// entry has not been summarized yet, every unsummarized entry is
    /// condensed into one archive summary.
    ///
    /// # Errors
    ///
    /// Invalid input, or a recency buffer failure. Promotion and
    /// summarization failures are reported in the returned [`WriteReport`].
    pub async fn add_interaction(&self, user_id: &str, text: &str, significance: f64) -> FabricResult<WriteReport> {
        validate_user_id(user_id)?;
        validate_text(text)?;
        validate_significance(significance)?;

        let gate = self.write_gate(user_id);
        let report = {
            let _guard = gate.lock().await;
            self.write_interaction(user_id, text, significance).await
        };
        self.release_gate(user_id, gate);
        report
    }

    async fn write_interaction(&self, user_id: &str, text: &str, significance: f64) -> FabricResult<WriteReport> {
        let buffered = self.recency.add(user_id, text).await?;

        let promotion = if significance > self.config.promotion_threshold {
            match self.semantic.add(user_id, text, significance.min(1.0)).await {
                Ok(()) => StepOutcome::Completed,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, step = "promotion", error = %e, "Partial write");
                    StepOutcome::Failed(e.to_string())
                }
            }
        } else {
            StepOutcome::Skipped
        };

        let summarization = if buffered.len >= self.config.max_items {
            match self.summarize_if_due(user_id).await {
                Ok(Some(_)) => StepOutcome::Completed,
                Ok(None) => StepOutcome::Skipped,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, step = "summarization", error = %e, "Partial write");
                    StepOutcome::Failed(e.to_string())
                }
            }
        } else {
            StepOutcome::Skipped
        };

        Ok(WriteReport {
            user_id: user_id.to_string(),
            seq: buffered.interaction.seq,
            promotion,
            summarization,
        })
    }

    /// Fetch context for `query` from all three tiers.
    ///
    /// The tiers are read concurrently and returned as separate blocks. Any
    /// tier failure fails the whole call; an unknown user gets empty blocks.
    pub async fn retrieve_context(&self, user_id: &str, query: &str) -> FabricResult<RetrievedContext> {
        validate_user_id(user_id)?;
        validate_text(query)?;

        let (recent, summaries, semantic) = tokio::join!(
            self.recency.get_all(user_id),
            self.archive.fetch_top(user_id, self.config.archive_limit),
            self.semantic.query(user_id, query, self.config.query_k),
        );

        let context = RetrievedContext {
            recent: recent?,
            summaries: summaries?.into_iter().map(|s| s.text).collect(),
            semantic: semantic?,
        };

        tracing::debug!(
            user_id = %user_id,
            recent = context.recent.len(),
            summaries = context.summaries.len(),
            semantic = context.semantic.len(),
            "Retrieved context"
        );
        Ok(context)
    }

    /// Summarize whatever is buffered but not yet summarized, full or not
    pub async fn summarize_now(&self, user_id: &str) -> FabricResult<Option<Summary>> {
        validate_user_id(user_id)?;

        let gate = self.write_gate(user_id);
        let summary = {
            let _guard = gate.lock().await;
            self.summarize_pending(user_id).await
        };
        self.release_gate(user_id, gate);
        summary
    }

    /// Summarize only if the next eviction would drop an unsummarized entry
    async fn summarize_if_due(&self, user_id: &str) -> FabricResult<Option<Summary>> {
        let cursor = self.recency.summarized_through(user_id).await?;
        match self.recency.oldest(user_id).await? {
            Some(oldest) if oldest.seq > cursor => self.summarize_pending(user_id).await,
            _ => Ok(None),
        }
    }

    async fn summarize_pending(&self, user_id: &str) -> FabricResult<Option<Summary>> {
        let pending = self.recency.pending_summary(user_id).await?;
        let Some(newest) = pending.last().map(|i| i.seq) else {
            return Ok(None);
        };

        let texts: Vec<String> = pending.into_iter().map(|i| i.text).collect();
        let text = self.summarizer.summarize(&texts).await?;
        let summary = self.archive.add_summary(user_id, &text).await?;

        if let Err(e) = self.recency.set_summarized_through(user_id, newest).await {
            // The summary is stored; these entries may be summarized again
            tracing::warn!(user_id = %user_id, error = %e, "Failed to advance summarization cursor");
            return Err(e);
        }

        tracing::info!(user_id = %user_id, interactions = texts.len(), through = newest, "Archived summary");
        Ok(Some(summary))
    }

    /// Decay one user's semantic importance as of now
    pub async fn decay(&self, user_id: &str) -> FabricResult<usize> {
        validate_user_id(user_id)?;
        self.semantic.decay(user_id, self.config.half_life_hours).await
    }

    /// Decay every known user; returns total records changed.
    ///
    /// A failing user is logged and skipped.
    pub async fn decay_all(&self) -> FabricResult<usize> {
        let mut changed = 0;
        for user_id in self.semantic.known_users()? {
            match self.semantic.decay(&user_id, self.config.half_life_hours).await {
                Ok(n) => changed += n,
                Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Decay failed"),
            }
        }
        tracing::info!(changed, "Decay pass complete");
        Ok(changed)
    }

    /// Re-embed a user's semantic records with the current embedder
    pub async fn rebuild_index(&self, user_id: &str) -> FabricResult<usize> {
        validate_user_id(user_id)?;
        self.semantic.rebuild(user_id).await
    }

    /// Per-tier counts for a user
    pub async fn stats(&self, user_id: &str) -> FabricResult<FabricStats> {
        validate_user_id(user_id)?;

        let (recent, summaries, semantic_records, summarized_through) = tokio::join!(
            self.recency.entries(user_id),
            self.archive.count(user_id),
            self.semantic.record_count(user_id),
            self.recency.summarized_through(user_id),
        );

        Ok(FabricStats {
            recent: recent?.len(),
            summaries: summaries?,
            semantic_records: semantic_records?,
            summarized_through: summarized_through?,
        })
    }

    /// Users with a semantic index on disk or in memory
    pub fn known_users(&self) -> FabricResult<Vec<String>> {
        self.semantic.known_users()
    }

    /// Stop handing out database connections
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const DIM: usize = 64;

    struct BrokenListStore;

    #[async_trait]
    impl ListStore for BrokenListStore {
        async fn push(&self, _key: &str, _value: &str) -> FabricResult<usize> {
            Err(FabricError::tier_unavailable(Tier::Recency, "connection refused"))
        }

        async fn trim(&self, _key: &str, _start: i64, _stop: i64) -> FabricResult<()> {
            Err(FabricError::tier_unavailable(Tier::Recency, "connection refused"))
        }

        async fn range(&self, _key: &str, _start: i64, _stop: i64) -> FabricResult<Vec<String>> {
            Err(FabricError::tier_unavailable(Tier::Recency, "connection refused"))
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn dimension(&self) -> usize {
            DIM
        }

        fn model_name(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _texts: &[String]) -> FabricResult<Vec<Vec<f32>>> {
            Err(FabricError::embedding("model unavailable"))
        }
    }

    struct BrokenSummarizer;

    #[async_trait]
    impl Summarizer for BrokenSummarizer {
        async fn summarize(&self, _texts: &[String]) -> FabricResult<String> {
            Err(FabricError::summarization("model unavailable"))
        }
    }

    fn test_config(dir: &TempDir, max_items: usize) -> FabricConfig {
        FabricConfig::new(dir.path().join("index"))
            .with_max_items(max_items)
            .with_embedding_dim(DIM)
    }

    fn setup_fabric_with(
        dir: &TempDir,
        max_items: usize,
        customize: impl FnOnce(Collaborators) -> Collaborators,
    ) -> (MemoryFabric, Arc<ManualClock>) {
        let config = test_config(dir, max_items);
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let parts = Collaborators::in_memory(&config).unwrap().with_clock(clock.clone());
        let fabric = MemoryFabric::new(config, customize(parts)).unwrap();
        (fabric, clock)
    }

    fn setup_fabric(dir: &TempDir, max_items: usize) -> (MemoryFabric, Arc<ManualClock>) {
        setup_fabric_with(dir, max_items, |parts| parts)
    }

    #[tokio::test]
    async fn test_buffer_holds_most_recent_max_items() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 5);

        for i in 0..6 {
            fabric.add_interaction("alice", &format!("message {}", i), 0.1).await.unwrap();
        }

        let context = fabric.retrieve_context("alice", "message").await.unwrap();
        assert_eq!(context.recent.len(), 5);
        assert_eq!(context.recent[0], "message 5");
        assert!(!context.recent.contains(&"message 0".to_string()));
    }

    #[tokio::test]
    async fn test_promotion_threshold() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 10);

        let low = fabric.add_interaction("alice", "quiet remark", 0.5).await.unwrap();
        assert_eq!(low.promotion, StepOutcome::Skipped);
        let at = fabric.add_interaction("alice", "borderline remark", 0.7).await.unwrap();
        assert_eq!(at.promotion, StepOutcome::Skipped);
        let high = fabric.add_interaction("alice", "production database password rotated", 0.9).await.unwrap();
        assert_eq!(high.promotion, StepOutcome::Completed);

        let context = fabric.retrieve_context("alice", "database password").await.unwrap();
        assert_eq!(context.semantic_texts(), vec!["production database password rotated"]);
    }

    #[tokio::test]
    async fn test_significance_above_one_is_clamped() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 10);

        let report = fabric.add_interaction("u", "critical outage", 4.0).await.unwrap();
        assert!(report.promotion.is_completed());

        let hits = fabric.semantic().query("u", "critical outage", 1).await.unwrap();
        assert_eq!(hits[0].importance, 1.0);
    }

    #[tokio::test]
    async fn test_one_summary_when_buffer_first_fills() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 3);

        for text in ["a", "b"] {
            let report = fabric.add_interaction("u", text, 0.1).await.unwrap();
            assert_eq!(report.summarization, StepOutcome::Skipped);
        }

        let filled = fabric.add_interaction("u", "c", 0.1).await.unwrap();
        assert_eq!(filled.summarization, StepOutcome::Completed);
        let summaries = fabric.archive().fetch_top("u", 10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].text, "a | b | c");

        let next = fabric.add_interaction("u", "d", 0.1).await.unwrap();
        assert_eq!(next.summarization, StepOutcome::Skipped);
        assert_eq!(fabric.archive().count("u").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_every_entry_is_summarized_before_eviction() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 3);

        for i in 1..=6 {
            fabric.add_interaction("u", &format!("m{}", i), 0.1).await.unwrap();
        }

        let summaries = fabric.archive().fetch_top("u", 10).await.unwrap();
        let mut texts: Vec<&str> = summaries.iter().map(|s| s.text.as_str()).collect();
        texts.sort();
        assert_eq!(texts, vec!["m1 | m2 | m3", "m4 | m5 | m6"]);
        assert_eq!(fabric.stats("u").await.unwrap().summarized_through, 6);
    }

    #[tokio::test]
    async fn test_summarize_now() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 10);

        assert!(fabric.summarize_now("u").await.unwrap().is_none());

        fabric.add_interaction("u", "one", 0.1).await.unwrap();
        fabric.add_interaction("u", "two", 0.1).await.unwrap();
        let summary = fabric.summarize_now("u").await.unwrap().unwrap();
        assert_eq!(summary.text, "one | two");

        // already covered
        assert!(fabric.summarize_now("u").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recency_failure_fails_the_write() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric_with(&dir, 5, |parts| parts.with_list_store(Arc::new(BrokenListStore)));

        let err = fabric.add_interaction("u", "hello", 0.9).await.unwrap_err();
        assert!(err.is_tier_unavailable());
        assert_eq!(err.tier(), Some(Tier::Recency));

        // nothing was promoted either
        assert_eq!(fabric.semantic().record_count("u").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_promotion_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric_with(&dir, 5, |parts| parts.with_embedder(Arc::new(BrokenEmbedder)));

        let report = fabric.add_interaction("u", "important", 0.9).await.unwrap();
        assert!(report.promotion.is_failed());
        assert!(!report.is_complete());
        assert_eq!(fabric.recency().get_all("u").await.unwrap(), vec!["important"]);
    }

    #[tokio::test]
    async fn test_summarization_failure_retries_on_next_add() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) =
            setup_fabric_with(&dir, 2, |parts| parts.with_summarizer(Arc::new(BrokenSummarizer)));

        fabric.add_interaction("u", "a", 0.1).await.unwrap();
        let full = fabric.add_interaction("u", "b", 0.1).await.unwrap();
        assert!(full.summarization.is_failed());

        let retried = fabric.add_interaction("u", "c", 0.1).await.unwrap();
        assert!(retried.summarization.is_failed());
        assert_eq!(fabric.stats("u").await.unwrap().summarized_through, 0);
    }

    #[tokio::test]
    async fn test_archive_outage_is_not_empty_context() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 5);
        fabric.add_interaction("u", "hello", 0.1).await.unwrap();

        fabric.close();
        let err = fabric.retrieve_context("u", "hello").await.unwrap_err();
        assert!(err.is_tier_unavailable());
        assert_eq!(err.tier(), Some(Tier::Archive));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 2);

        for text in ["alice one", "alice two"] {
            fabric.add_interaction("alice", text, 0.9).await.unwrap();
        }
        fabric.add_interaction("bob", "bob only", 0.1).await.unwrap();

        let bob = fabric.retrieve_context("bob", "alice").await.unwrap();
        assert_eq!(bob.recent, vec!["bob only"]);
        assert!(bob.summaries.is_empty());
        assert!(bob.semantic.is_empty());

        let alice = fabric.retrieve_context("alice", "alice").await.unwrap();
        assert_eq!(alice.summaries.len(), 1);
        assert_eq!(alice.semantic.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_empty_context() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 5);

        let context = fabric.retrieve_context("nobody", "anything").await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 5);

        assert!(fabric.add_interaction("", "text", 0.5).await.unwrap_err().is_invalid_input());
        assert!(fabric.add_interaction("../etc", "text", 0.5).await.unwrap_err().is_invalid_input());
        assert!(fabric.add_interaction("u", "", 0.5).await.unwrap_err().is_invalid_input());
        assert!(fabric.add_interaction("u", "text", f64::NAN).await.unwrap_err().is_invalid_input());
        assert!(fabric.retrieve_context("u", "  ").await.unwrap_err().is_invalid_input());

        assert_eq!(fabric.stats("u").await.unwrap(), FabricStats::default());
    }

    #[tokio::test]
    async fn test_decay_all_and_stats() {
        let dir = TempDir::new().unwrap();
        let (fabric, clock) = setup_fabric(&dir, 10);

        fabric.add_interaction("alice", "alpha", 0.8).await.unwrap();
        fabric.add_interaction("bob", "beta", 0.9).await.unwrap();

        assert_eq!(fabric.decay_all().await.unwrap(), 0);

        clock.advance(48.0 * 3600.0);
        assert_eq!(fabric.decay_all().await.unwrap(), 2);
        assert_eq!(fabric.decay("alice").await.unwrap(), 0);

        let hits = fabric.semantic().query("alice", "alpha", 1).await.unwrap();
        assert!((hits[0].importance - 0.4).abs() < 1e-9);

        let stats = fabric.stats("alice").await.unwrap();
        assert_eq!(stats.recent, 1);
        assert_eq!(stats.semantic_records, 1);
        assert_eq!(fabric.known_users().unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_semantic_tier_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let (fabric, _) = setup_fabric(&dir, 10);
            fabric.add_interaction("u", "the launch code is blue", 0.95).await.unwrap();
        }

        let (fabric, _) = setup_fabric(&dir, 10);
        let context = fabric.retrieve_context("u", "launch code").await.unwrap();
        assert!(context.recent.is_empty());
        assert_eq!(context.semantic_texts(), vec!["the launch code is blue"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_for_one_user_are_serialized() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 32);
        let fabric = Arc::new(fabric);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let fabric = fabric.clone();
                tokio::spawn(async move { fabric.add_interaction("u", &format!("event {}", i), 0.9).await })
            })
            .collect();

        let mut seqs = Vec::new();
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert!(report.promotion.is_completed());
            seqs.push(report.seq);
        }
        seqs.sort();
        assert_eq!(seqs, (1..=16).collect::<Vec<u64>>());

        let stats = fabric.stats("u").await.unwrap();
        assert_eq!(stats.recent, 16);
        assert_eq!(stats.semantic_records, 16);
        assert!(fabric.write_gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_held_write_gate_does_not_block_other_users() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 5);

        let gate = fabric.write_gate("alice");
        let held = gate.lock().await;

        let bob = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            fabric.add_interaction("bob", "not waiting", 0.9),
        )
        .await;
        assert!(bob.unwrap().is_ok());

        let alice = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            fabric.add_interaction("alice", "queued", 0.1),
        )
        .await;
        assert!(alice.is_err());

        drop(held);
        fabric.release_gate("alice", gate);
        fabric.add_interaction("alice", "proceeds", 0.1).await.unwrap();
        assert_eq!(fabric.recency().get_all("alice").await.unwrap(), vec!["proceeds"]);
    }

    #[tokio::test]
    async fn test_reads_do_not_register_users() {
        let dir = TempDir::new().unwrap();
        let (fabric, _) = setup_fabric(&dir, 5);
        fabric.add_interaction("alice", "real memory", 0.9).await.unwrap();
        let before = fabric.known_users().unwrap();

        for ghost in ["ghost0", "ghost1", "ghost2"] {
            assert!(fabric.retrieve_context(ghost, "anything").await.unwrap().is_empty());
            assert_eq!(fabric.stats(ghost).await.unwrap(), FabricStats::default());
            assert!(fabric.summarize_now(ghost).await.unwrap().is_none());
        }

        assert_eq!(fabric.known_users().unwrap(), before);
        assert_eq!(before, vec!["alice"]);
        assert!(fabric.write_gates.lock().unwrap().is_empty());
        assert_eq!(fabric.decay_all().await.unwrap(), 0);
    }

    #[test]
    fn test_rejects_embedder_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, 5);
        let parts = Collaborators::in_memory(&config)
            .unwrap()
            .with_embedder(Arc::new(HashEmbedder::new(DIM * 2)));

        let err = MemoryFabric::new(config, parts).err().unwrap();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, 0);
        let parts = Collaborators::in_memory(&test_config(&dir, 5)).unwrap();

        assert!(matches!(MemoryFabric::new(config, parts), Err(FabricError::Config(_))));
    }
}
