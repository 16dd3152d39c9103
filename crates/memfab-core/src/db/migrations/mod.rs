//! Fabric database migrations
//!
//! SQL migrations are embedded as strings and executed during setup.

use rusqlite::Connection;

/// Fabric tables SQL (001)
pub const FABRIC_TABLES_SQL: &str = include_str!("001_fabric_tables.sql");

/// Run all fabric migrations
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(FABRIC_TABLES_SQL)
}
