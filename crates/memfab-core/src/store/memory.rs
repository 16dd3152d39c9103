//! In-process list store.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ListStore, resolve_range};
use crate::error::FabricResult;

/// List store held in process memory; contents are lost on exit
#[derive(Debug, Default)]
pub struct InMemoryListStore {
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl InMemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn push(&self, key: &str, value: &str) -> FabricResult<usize> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        Ok(list.len())
    }

    async fn trim(&self, key: &str, start: i64, stop: i64) -> FabricResult<()> {
        let mut lists = self.lists.write().await;
        let Some(list) = lists.get_mut(key) else {
            return Ok(());
        };

        match resolve_range(list.len(), start, stop) {
            Some((start, stop)) => {
                list.truncate(stop + 1);
                list.drain(..start);
            }
            None => {
                lists.remove(key);
            }
        }
        Ok(())
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> FabricResult<Vec<String>> {
        let lists = self.lists.read().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };

        Ok(match resolve_range(list.len(), start, stop) {
            Some((start, stop)) => list.range(start..=stop).cloned().collect(),
            None => Vec::new(),
        })
    }
}
