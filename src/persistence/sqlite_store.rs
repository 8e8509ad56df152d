//! SQLite implementation of the KeyValueStore trait

use super::{KeyValueStore, PersistenceError};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed keyed store
///
/// A single `kv` table holds every namespace (`bruteforce:`, `stuffing:`,
/// `reputation:`, `baseline:`, `metrics:`, `user:`, `session:`). Expiry
/// is enforced on read; [`SqliteKeyValueStore::purge_expired`] reclaims
/// dead rows.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open (or create) a store at the specified path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteKeyValueStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteKeyValueStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Delete rows whose TTL has elapsed. Returns the number removed.
    pub fn purge_expired(&self) -> Result<usize, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?",
            params![Utc::now().timestamp()],
        )?;
        Ok(removed)
    }

    /// Clear all data (useful for testing).
    pub fn clear_all(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT value FROM kv
             WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )?;

        let result = stmt.query_row(params![key, Utc::now().timestamp()], |row| {
            row.get::<_, String>(0)
        });

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<(), PersistenceError> {
        let expires_at = ttl_seconds.map(|ttl| Utc::now().timestamp() + ttl);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT key FROM kv
             WHERE key LIKE ? || '%' AND (expires_at IS NULL OR expires_at > ?)
             ORDER BY key",
        )?;

        let keys = stmt
            .query_map(params![prefix, Utc::now().timestamp()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(keys)
    }
}
