//! Semantic index (macro tier).
//!
//! Each user owns two files under the index directory:
//!
//! - `{user_id}.index`: unit-normalized vectors in a [`FlatIndex`]
//! - `{user_id}_meta.json`: a JSON array of records, position-aligned
//!   with the vectors
//!
//! Saves write the index first and the metadata last, so the metadata
//! file is the commit point. A crash between the two leaves extra
//! vectors, which the next load drops. Unreadable records load as empty
//! slots that searches skip; they keep their position so that vectors
//! and records never shift against each other.
//!
//! Importance decays exponentially from each record's creation time:
//! `importance = base * exp(-ln2 / half_life * age)`, never increasing
//! and never reaching zero.

use std::collections::HashMap;
use std::f64::consts::LN_2;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::embeddings::{Embedder, embed_one, normalize_l2};
use crate::error::{FabricError, FabricResult};
use crate::index::FlatIndex;
use crate::types::{MemoryRecord, SemanticHit};
use crate::utils::{Clock, validate_importance, validate_text, validate_user_id, write_atomic};

const INDEX_SUFFIX: &str = ".index";
const META_SUFFIX: &str = "_meta.json";

/// One user's vectors and their metadata
#[derive(Debug)]
pub struct SemanticIndex {
    user_id: String,
    index: FlatIndex,
    records: Vec<Option<MemoryRecord>>,
    index_path: PathBuf,
    meta_path: PathBuf,
}

impl SemanticIndex {
    pub fn index_path(dir: &Path, user_id: &str) -> PathBuf {
        dir.join(format!("{}{}", user_id, INDEX_SUFFIX))
    }

    pub fn meta_path(dir: &Path, user_id: &str) -> PathBuf {
        dir.join(format!("{}{}", user_id, META_SUFFIX))
    }

    /// Load a user's index from `dir`, or start an empty one.
    ///
    /// Nothing is written until the first mutation.
    pub fn open(dir: &Path, user_id: &str, dim: usize) -> FabricResult<Self> {
        let index_path = Self::index_path(dir, user_id);
        let meta_path = Self::meta_path(dir, user_id);

        let mut index = if index_path.exists() {
            FlatIndex::load(&index_path)?
        } else {
            FlatIndex::new(dim)
        };
        if index.dimension() != dim {
            return Err(FabricError::corrupt_metadata(
                user_id,
                format!(
                    "index has {} dimensions, embedder produces {}",
                    index.dimension(),
                    dim
                ),
            ));
        }

        let mut records = if meta_path.exists() {
            load_metadata(user_id, &meta_path)?
        } else {
            Vec::new()
        };

        if index.len() != records.len() {
            let kept = index.len().min(records.len());
            tracing::warn!(
                user_id = %user_id,
                vectors = index.len(),
                records = records.len(),
                kept,
                "Semantic index and metadata disagree, keeping common prefix"
            );
            index.truncate(kept);
            records.truncate(kept);
        }

        tracing::debug!(user_id = %user_id, records = records.len(), "Opened semantic index");

        Ok(Self {
            user_id: user_id.to_string(),
            index,
            records,
            index_path,
            meta_path,
        })
    }

    /// Metadata alone, against an empty index of `dim`; input for [`Self::rebuild`]
    fn from_metadata(dir: &Path, user_id: &str, dim: usize) -> FabricResult<Self> {
        let meta_path = Self::meta_path(dir, user_id);
        let records = if meta_path.exists() {
            load_metadata(user_id, &meta_path)?
        } else {
            Vec::new()
        };

        Ok(Self {
            user_id: user_id.to_string(),
            index: FlatIndex::new(dim),
            records,
            index_path: Self::index_path(dir, user_id),
            meta_path,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Number of index positions, including skipped slots
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Readable records in position order
    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.iter().flatten()
    }

    /// Persist vectors, then metadata
    pub fn save(&self) -> FabricResult<()> {
        self.index.save(&self.index_path)?;
        let meta = serde_json::to_vec(&self.records)?;
        write_atomic(&self.meta_path, &meta)
    }

    /// Index `vector` for `record` and persist; on failure nothing changes in memory
    pub fn insert(&mut self, mut vector: Vec<f32>, record: MemoryRecord) -> FabricResult<usize> {
        validate_importance(record.importance)?;
        normalize_l2(&mut vector);

        let position = self.index.add(&vector)?;
        self.records.push(Some(record));

        if let Err(e) = self.save() {
            self.index.truncate(position);
            self.records.truncate(position);
            return Err(e);
        }
        Ok(position)
    }

    /// Top `k` records by similarity, re-ranked by `similarity * importance`
    pub fn search(&self, mut query: Vec<f32>, k: usize) -> Vec<SemanticHit> {
        normalize_l2(&mut query);

        let skipped = self.records.iter().filter(|r| r.is_none()).count();
        let mut hits: Vec<SemanticHit> = self
            .index
            .search(&query, k.saturating_add(skipped))
            .into_iter()
            .filter_map(|(similarity, position)| match self.records.get(position) {
                Some(Some(record)) => Some(SemanticHit {
                    text: record.text.clone(),
                    similarity,
                    importance: record.importance,
                    score: similarity as f64 * record.importance,
                    timestamp: record.timestamp,
                }),
                _ => {
                    tracing::debug!(user_id = %self.user_id, position, "Skipping position without metadata");
                    None
                }
            })
            .collect();

        hits.truncate(k);
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    /// Decay every record to its value at `now` and persist.
    ///
    /// Returns how many records changed; with no elapsed time that is zero
    /// and nothing is written.
    pub fn decay_importance(&mut self, now: f64, half_life_hours: f64) -> FabricResult<usize> {
        let lambda = decay_rate(half_life_hours)?;

        let previous = self.records.clone();
        let mut changed = 0;
        for record in self.records.iter_mut().flatten() {
            let age = (now - record.timestamp).max(0.0);
            let decayed = (record.base_importance * (-lambda * age).exp()).max(f64::MIN_POSITIVE);
            if decayed < record.importance {
                record.importance = decayed;
                changed += 1;
            }
        }

        if changed == 0 {
            return Ok(0);
        }
        if let Err(e) = self.save() {
            self.records = previous;
            return Err(e);
        }

        tracing::debug!(user_id = %self.user_id, changed, "Decayed importance");
        Ok(changed)
    }

    /// Texts of readable records, in position order
    pub fn texts(&self) -> Vec<String> {
        self.records().map(|r| r.text.clone()).collect()
    }

    /// Replace every vector with a fresh embedding of [`Self::texts`].
    ///
    /// Unreadable slots get a zero vector and stay in place, so the new
    /// index lines up with the metadata already on disk.
    pub fn rebuild(&mut self, vectors: Vec<Vec<f32>>) -> FabricResult<()> {
        let readable = self.records().count();
        if vectors.len() != readable {
            return Err(FabricError::invalid_input(format!(
                "rebuild got {} vectors for {} records",
                vectors.len(),
                readable
            )));
        }

        let dim = self.index.dimension();
        let mut index = FlatIndex::new(dim);
        let mut vectors = vectors.into_iter();
        for record in &self.records {
            let mut vector = match record {
                Some(_) => vectors
                    .next()
                    .ok_or_else(|| FabricError::invalid_input("rebuild ran out of vectors"))?,
                None => vec![0.0; dim],
            };
            normalize_l2(&mut vector);
            index.add(&vector)?;
        }

        let old_index = std::mem::replace(&mut self.index, index);
        if let Err(e) = self.save() {
            self.index = old_index;
            return Err(e);
        }
        Ok(())
    }
}

/// Per-second decay constant for a half-life in hours
fn decay_rate(half_life_hours: f64) -> FabricResult<f64> {
    if !half_life_hours.is_finite() || half_life_hours <= 0.0 {
        return Err(FabricError::invalid_input(format!(
            "half-life must be positive, got {}",
            half_life_hours
        )));
    }
    Ok(LN_2 / (half_life_hours * 3600.0))
}

fn load_metadata(user_id: &str, path: &Path) -> FabricResult<Vec<Option<MemoryRecord>>> {
    let raw = std::fs::read(path)?;
    let values: Vec<serde_json::Value> = serde_json::from_slice(&raw)
        .map_err(|e| FabricError::corrupt_metadata(user_id, format!("{}: {}", path.display(), e)))?;

    let records = values
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            if value.is_null() {
                return None;
            }
            match serde_json::from_value::<MemoryRecord>(value) {
                Ok(mut record) if validate_importance(record.importance).is_ok() => {
                    if !(record.base_importance > 0.0 && record.base_importance.is_finite()) {
                        record.base_importance = record.importance;
                    }
                    Some(record)
                }
                Ok(_) | Err(_) => {
                    let err = FabricError::corrupt_metadata(user_id, format!("unreadable record at position {}", position));
                    tracing::warn!(error = %err, "Skipping record");
                    None
                }
            }
        })
        .collect();

    Ok(records)
}

type Slot = Arc<AsyncMutex<Option<SemanticIndex>>>;

/// Per-user semantic indices, loaded lazily and locked per user
pub struct SemanticTier {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SemanticTier {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            embedder,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    fn slot(&self, user_id: &str) -> Slot {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    fn cached_slot(&self, user_id: &str) -> Option<Slot> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    fn on_disk(&self, user_id: &str) -> bool {
        SemanticIndex::meta_path(&self.dir, user_id).exists()
            || SemanticIndex::index_path(&self.dir, user_id).exists()
    }

    /// Lock a user's index, loading it on first use
    async fn lock(&self, user_id: &str) -> FabricResult<OwnedMutexGuard<Option<SemanticIndex>>> {
        load_into(self.slot(user_id), &self.dir, user_id, self.dimension()).await
    }

    /// Like [`Self::lock`], but `None` for a user with nothing cached or on disk.
    ///
    /// Reads go through here so unknown users never get a slot.
    async fn lock_existing(&self, user_id: &str) -> FabricResult<Option<OwnedMutexGuard<Option<SemanticIndex>>>> {
        let slot = match self.cached_slot(user_id) {
            Some(slot) => slot,
            None if self.on_disk(user_id) => self.slot(user_id),
            None => return Ok(None),
        };
        load_into(slot, &self.dir, user_id, self.dimension()).await.map(Some)
    }

    /// Embed and index `text` with the given importance
    pub async fn add(&self, user_id: &str, text: &str, importance: f64) -> FabricResult<()> {
        validate_user_id(user_id)?;
        validate_text(text)?;
        validate_importance(importance)?;

        let vector = embed_one(self.embedder.as_ref(), text).await?;
        let record = MemoryRecord::new(text, self.clock.now(), importance);

        let mut guard = self.lock(user_id).await?;
        let position = loaded(&mut guard, user_id)?.insert(vector, record)?;

        tracing::debug!(user_id = %user_id, position, importance, "Promoted to semantic index");
        Ok(())
    }

    /// Up to `k` hits for `text`, by descending `similarity * importance`
    pub async fn query(&self, user_id: &str, text: &str, k: usize) -> FabricResult<Vec<SemanticHit>> {
        validate_user_id(user_id)?;
        validate_text(text)?;
        if k == 0 || (self.cached_slot(user_id).is_none() && !self.on_disk(user_id)) {
            return Ok(Vec::new());
        }

        let vector = embed_one(self.embedder.as_ref(), text).await?;
        let Some(mut guard) = self.lock_existing(user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(loaded(&mut guard, user_id)?.search(vector, k))
    }

    /// Apply decay as of now; returns records changed
    pub async fn decay(&self, user_id: &str, half_life_hours: f64) -> FabricResult<usize> {
        validate_user_id(user_id)?;
        decay_rate(half_life_hours)?;

        let now = self.clock.now();
        let Some(mut guard) = self.lock_existing(user_id).await? else {
            return Ok(0);
        };
        loaded(&mut guard, user_id)?.decay_importance(now, half_life_hours)
    }

    /// Re-embed every record with the current embedder; returns records indexed.
    ///
    /// Works from the metadata file, so it also recovers an index written
    /// with a different embedding dimension.
    pub async fn rebuild(&self, user_id: &str) -> FabricResult<usize> {
        validate_user_id(user_id)?;
        if self.cached_slot(user_id).is_none() && !self.on_disk(user_id) {
            return Ok(0);
        }

        let mut guard = self.slot(user_id).lock_owned().await;
        let mut index = SemanticIndex::from_metadata(&self.dir, user_id, self.dimension())?;

        let texts = index.texts();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&texts).await?
        };
        index.rebuild(vectors)?;
        *guard = Some(index);

        tracing::info!(user_id = %user_id, records = texts.len(), model = self.embedder.model_name(), "Rebuilt semantic index");
        Ok(texts.len())
    }

    /// Readable records for a user
    pub async fn record_count(&self, user_id: &str) -> FabricResult<usize> {
        validate_user_id(user_id)?;
        let Some(mut guard) = self.lock_existing(user_id).await? else {
            return Ok(0);
        };
        Ok(loaded(&mut guard, user_id)?.records().count())
    }

    /// Drop the cached index so the next call reloads from disk
    pub async fn unload(&self, user_id: &str) {
        if let Some(slot) = self.cached_slot(user_id) {
            *slot.lock().await = None;
        }
    }

    /// Users with metadata on disk or a non-empty index in memory, sorted
    pub fn known_users(&self) -> FabricResult<Vec<String>> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(user_id, slot)| (user_id.clone(), slot.clone()))
            .collect();

        // A slot busy elsewhere is skipped; once written it is on disk
        let mut users: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| {
                slot.try_lock()
                    .map(|guard| guard.as_ref().is_some_and(|index| !index.is_empty()))
                    .unwrap_or(false)
            })
            .map(|(user_id, _)| user_id)
            .collect();

        if self.dir.is_dir() {
            for entry in std::fs::read_dir(&self.dir)? {
                let name = entry?.file_name();
                if let Some(user_id) = name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX)) {
                    users.push(user_id.to_string());
                }
            }
        }

        users.sort();
        users.dedup();
        Ok(users)
    }
}

async fn load_into(
    slot: Slot,
    dir: &Path,
    user_id: &str,
    dim: usize,
) -> FabricResult<OwnedMutexGuard<Option<SemanticIndex>>> {
    let mut guard = slot.lock_owned().await;
    if guard.is_none() {
        *guard = Some(SemanticIndex::open(dir, user_id, dim)?);
    }
    Ok(guard)
}

fn loaded<'a>(
    guard: &'a mut OwnedMutexGuard<Option<SemanticIndex>>,
    user_id: &str,
) -> FabricResult<&'a mut SemanticIndex> {
    guard
        .as_mut()
        .ok_or_else(|| FabricError::corrupt_metadata(user_id, "semantic index not loaded"))
}
