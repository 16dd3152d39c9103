//! SQLite-backed list store.
//!
//! Each element is a row keyed by `(list_key, position)`; the head is the
//! highest position, so a push is a single insert.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use super::{ListStore, resolve_range};
use crate::db::SqlitePool;
use crate::error::{FabricError, FabricResult};
use crate::types::Tier;

/// Durable list store sharing the fabric's SQLite pool
pub struct SqliteListStore {
    pool: Arc<SqlitePool>,
}

impl SqliteListStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

fn db_err(e: rusqlite::Error) -> FabricError {
    FabricError::database(Tier::Recency, e)
}

fn count(conn: &rusqlite::Connection, key: &str) -> rusqlite::Result<usize> {
    conn.query_row(
        "SELECT COUNT(*) FROM list_items WHERE list_key = ?1",
        params![key],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as usize)
}

fn position_at(conn: &rusqlite::Connection, key: &str, rank: usize) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT position FROM list_items WHERE list_key = ?1
         ORDER BY position DESC LIMIT 1 OFFSET ?2",
        params![key, rank as i64],
        |row| row.get(0),
    )
    .optional()
}

#[async_trait]
impl ListStore for SqliteListStore {
    async fn push(&self, key: &str, value: &str) -> FabricResult<usize> {
        let conn = self.pool.acquire(Tier::Recency).await?;
        let tx = conn.unchecked_transaction().map_err(db_err)?;

        tx.execute(
            "INSERT INTO list_items (list_key, position, value)
             SELECT ?1, COALESCE(MAX(position), 0) + 1, ?2
             FROM list_items WHERE list_key = ?1",
            params![key, value],
        )
        .map_err(db_err)?;
        let len = count(&tx, key).map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(len)
    }

    async fn trim(&self, key: &str, start: i64, stop: i64) -> FabricResult<()> {
        let conn = self.pool.acquire(Tier::Recency).await?;
        let tx = conn.unchecked_transaction().map_err(db_err)?;

        let len = count(&tx, key).map_err(db_err)?;
        match resolve_range(len, start, stop) {
            Some((start, stop)) => {
                let newest = position_at(&tx, key, start).map_err(db_err)?;
                let oldest = position_at(&tx, key, stop).map_err(db_err)?;
                if let (Some(newest), Some(oldest)) = (newest, oldest) {
                    tx.execute(
                        "DELETE FROM list_items
                         WHERE list_key = ?1 AND (position > ?2 OR position < ?3)",
                        params![key, newest, oldest],
                    )
                    .map_err(db_err)?;
                }
            }
            None => {
                tx.execute("DELETE FROM list_items WHERE list_key = ?1", params![key])
                    .map_err(db_err)?;
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(())
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> FabricResult<Vec<String>> {
        let conn = self.pool.acquire(Tier::Recency).await?;

        let len = count(&conn, key).map_err(db_err)?;
        let Some((start, stop)) = resolve_range(len, start, stop) else {
            return Ok(Vec::new());
        };

        let mut stmt = conn
            .prepare(
                "SELECT value FROM list_items WHERE list_key = ?1
                 ORDER BY position DESC LIMIT ?2 OFFSET ?3",
            )
            .map_err(db_err)?;
        let values = stmt
            .query_map(
                params![key, (stop - start + 1) as i64, start as i64],
                |row| row.get::<_, String>(0),
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup_store() -> SqliteListStore {
        let pool = SqlitePool::open_in_memory(Duration::from_secs(1)).unwrap();
        SqliteListStore::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_push_range_trim() {
        let store = setup_store();
        for (i, v) in ["a", "b", "c", "d"].iter().enumerate() {
            assert_eq!(store.push("k", v).await.unwrap(), i + 1);
        }

        assert_eq!(store.range("k", 0, -1).await.unwrap(), vec!["d", "c", "b", "a"]);
        assert_eq!(store.range("k", 1, 2).await.unwrap(), vec!["c", "b"]);

        store.trim("k", 0, 2).await.unwrap();
        assert_eq!(store.range("k", 0, -1).await.unwrap(), vec!["d", "c", "b"]);

        // Positions keep growing after a trim
        store.push("k", "e").await.unwrap();
        assert_eq!(store.range("k", 0, 0).await.unwrap(), vec!["e"]);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = setup_store();
        store.push("micro:alice", "hi").await.unwrap();
        store.push("micro:bob", "yo").await.unwrap();

        assert_eq!(store.range("micro:alice", 0, -1).await.unwrap(), vec!["hi"]);
        assert_eq!(store.range("micro:bob", 0, -1).await.unwrap(), vec!["yo"]);

        store.trim("micro:alice", 1, 0).await.unwrap();
        assert!(store.range("micro:alice", 0, -1).await.unwrap().is_empty());
        assert_eq!(store.range("micro:bob", 0, -1).await.unwrap(), vec!["yo"]);
    }
}
