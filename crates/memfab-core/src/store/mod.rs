//! Key-value list store backing the recency tier.
//!
//! Lists follow Redis `LPUSH`/`LTRIM`/`LRANGE` semantics: index 0 is the
//! head (most recently pushed), ranges are inclusive on both ends, and
//! negative indices count back from the tail (-1 is the last element).

mod memory;
mod sqlite;

pub use memory::InMemoryListStore;
pub use sqlite::SqliteListStore;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FabricError, FabricResult};
use crate::types::Tier;

/// List store operations used by the recency buffer
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Push `value` at the head of `key`, returning the new length
    async fn push(&self, key: &str, value: &str) -> FabricResult<usize>;

    /// Keep only elements `start..=stop`; an empty range deletes the list
    async fn trim(&self, key: &str, start: i64, stop: i64) -> FabricResult<()>;

    /// Elements `start..=stop`, head first
    async fn range(&self, key: &str, start: i64, stop: i64) -> FabricResult<Vec<String>>;
}

/// Resolve a Redis-style inclusive range against a list of `len` elements
pub(crate) fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Run a store call under a deadline, reporting expiry as a tier outage
pub async fn with_timeout<T, F>(tier: Tier, timeout: Duration, fut: F) -> FabricResult<T>
where
    F: Future<Output = FabricResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FabricError::timeout(tier, timeout.as_millis() as u64)),
    }
}
