//! Summary archive (meso tier).
//!
//! Summaries live in the `summaries` table of the fabric database. Reads
//! rank by `last_access` and never touch it; callers that want read
//! tracking call [`ArchiveStore::mark_accessed`] explicitly.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::params;
use uuid::Uuid;

use crate::db::SqlitePool;
use crate::error::{FabricError, FabricResult};
use crate::store::with_timeout;
use crate::types::{Summary, Tier};
use crate::utils::Clock;

/// Durable per-user summary store
pub struct ArchiveStore {
    pool: Arc<SqlitePool>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

fn db_err(e: rusqlite::Error) -> FabricError {
    FabricError::database(Tier::Archive, e)
}

impl ArchiveStore {
    pub fn new(pool: Arc<SqlitePool>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { pool, clock, timeout }
    }

    /// Persist a new summary; `created_at` and `last_access` are both now
    pub async fn add_summary(&self, user_id: &str, text: &str) -> FabricResult<Summary> {
        let now = self.clock.now();
        let summary = Summary {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: now,
            last_access: now,
        };

        with_timeout(Tier::Archive, self.timeout, async {
            let conn = self.pool.acquire(Tier::Archive).await?;
            conn.execute(
                "INSERT INTO summaries (id, user_id, summary, created_at, last_access)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    summary.id,
                    summary.user_id,
                    summary.text,
                    summary.created_at,
                    summary.last_access
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await?;

        tracing::debug!(user_id = %user_id, id = %summary.id, "Archived summary");
        Ok(summary)
    }

    /// Up to `limit` summaries, most recently accessed first.
    ///
    /// Ties fall back to creation time, then insertion order.
    pub async fn fetch_top(&self, user_id: &str, limit: usize) -> FabricResult<Vec<Summary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        with_timeout(Tier::Archive, self.timeout, async {
            let conn = self.pool.acquire(Tier::Archive).await?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, summary, created_at, last_access FROM summaries
                     WHERE user_id = ?1
                     ORDER BY last_access DESC, created_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(db_err)?;

            let summaries = stmt
                .query_map(params![user_id, limit as i64], |row| {
                    Ok(Summary {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        text: row.get(2)?,
                        created_at: row.get(3)?,
                        last_access: row.get(4)?,
                    })
                })
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;

            Ok(summaries)
        })
        .await
    }

    /// Set `last_access` to now for the given summaries; returns rows touched
    pub async fn mark_accessed(&self, user_id: &str, ids: &[String]) -> FabricResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = self.clock.now();

        with_timeout(Tier::Archive, self.timeout, async {
            let conn = self.pool.acquire(Tier::Archive).await?;
            let tx = conn.unchecked_transaction().map_err(db_err)?;
            let mut touched = 0;
            {
                let mut stmt = tx
                    .prepare("UPDATE summaries SET last_access = ?1 WHERE id = ?2 AND user_id = ?3")
                    .map_err(db_err)?;
                for id in ids {
                    touched += stmt.execute(params![now, id, user_id]).map_err(db_err)?;
                }
            }
            tx.commit().map_err(db_err)?;
            Ok(touched)
        })
        .await
    }

    /// Number of summaries held for a user
    pub async fn count(&self, user_id: &str) -> FabricResult<usize> {
        with_timeout(Tier::Archive, self.timeout, async {
            let conn = self.pool.acquire(Tier::Archive).await?;
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM summaries WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            Ok(n as usize)
        })
        .await
    }
}
