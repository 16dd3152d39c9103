//! SQLite connection pool.
//!
//! A fixed set of connections handed out one caller at a time. Acquisition
//! waits at most the configured timeout; the connection goes back to the
//! pool when the guard drops, whatever path the caller takes out.

pub mod migrations;

use std::ops::Deref;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{FabricError, FabricResult};
use crate::types::Tier;

/// Pool of SQLite connections shared by the durable tiers
pub struct SqlitePool {
    idle: Mutex<Vec<Connection>>,
    permits: Semaphore,
    size: usize,
    acquire_timeout: Duration,
}

impl SqlitePool {
    /// Open `size` connections to the database at `path` and run migrations
    pub fn open(path: &Path, size: usize, acquire_timeout: Duration) -> rusqlite::Result<Self> {
        let size = size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path)?;
            // Enable WAL mode for better concurrency
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
            conn.busy_timeout(acquire_timeout)?;
            conns.push(conn);
        }
        migrations::run_migrations(&conns[0])?;

        tracing::debug!(path = %path.display(), size, "Opened SQLite pool");
        Ok(Self::from_connections(conns, acquire_timeout))
    }

    /// Single-connection in-memory pool (each in-memory connection is its own database)
    pub fn open_in_memory(acquire_timeout: Duration) -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self::from_connections(vec![conn], acquire_timeout))
    }

    fn from_connections(conns: Vec<Connection>, acquire_timeout: Duration) -> Self {
        let size = conns.len();
        Self {
            idle: Mutex::new(conns),
            permits: Semaphore::new(size),
            size,
            acquire_timeout,
        }
    }

    /// Check out a connection, attributing failures to `tier`
    pub async fn acquire(&self, tier: Tier) -> FabricResult<PooledConnection<'_>> {
        let permit = tokio::time::timeout(self.acquire_timeout, self.permits.acquire())
            .await
            .map_err(|_| FabricError::timeout(tier, self.acquire_timeout.as_millis() as u64))?
            .map_err(|_| FabricError::tier_unavailable(tier, "connection pool closed"))?;

        let conn = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .ok_or_else(|| FabricError::tier_unavailable(tier, "connection pool exhausted"))?;

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self,
            _permit: permit,
        })
    }

    /// Refuse all further acquisitions
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Number of connections owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections not currently checked out
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// A checked-out connection; returned to the pool on drop
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    pool: &'a SqlitePool,
    _permit: SemaphorePermit<'a>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = SqlitePool::open_in_memory(Duration::from_millis(100)).unwrap();
        assert_eq!(pool.available(), 1);

        {
            let conn = pool.acquire(Tier::Archive).await.unwrap();
            conn.execute_batch("SELECT 1").unwrap();
            assert_eq!(pool.available(), 0);
        }

        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_exhausted() {
        let pool = SqlitePool::open_in_memory(Duration::from_millis(20)).unwrap();
        let _held = pool.acquire(Tier::Archive).await.unwrap();

        let err = pool.acquire(Tier::Recency).await.err().unwrap();
        assert!(err.is_tier_unavailable());
        assert_eq!(err.tier(), Some(Tier::Recency));
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let pool = SqlitePool::open_in_memory(Duration::from_millis(20)).unwrap();
        pool.close();
        assert!(pool.is_closed());

        let err = pool.acquire(Tier::Archive).await.err().unwrap();
        assert!(err.is_tier_unavailable());
    }

    #[tokio::test]
    async fn test_file_pool_runs_migrations() {
        let dir = TempDir::new().unwrap();
        let pool = SqlitePool::open(&dir.path().join("fabric.db"), 3, Duration::from_secs(1)).unwrap();
        assert_eq!(pool.size(), 3);

        let conn = pool.acquire(Tier::Archive).await.unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
