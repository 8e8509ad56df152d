//! Persistence module for cross-request state
//!
//! All shared state (attempt windows, device reputation, behavioral
//! baselines, daily metrics, users, sessions) lives behind a narrow
//! keyed-store interface so storage backends are swappable and detector
//! logic stays unit-testable without a database.

pub mod sqlite_store;

pub use sqlite_store::SqliteKeyValueStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data in store: {0}")]
    InvalidData(#[from] serde_json::Error),
}

/// Trait for keyed storage backends
///
/// Values are opaque strings (JSON in practice) with an optional
/// time-to-live. Expired entries read as absent. Call sites use a
/// read-modify-write pattern and writes are last-writer-wins: concurrent
/// updates to the same key may lose an increment. That is an accepted
/// property of the system (risk signals are heuristics, not a ledger)
/// and the policy is decided once here rather than per call site.
pub trait KeyValueStore: Send + Sync {
    /// Get the live value for a key, `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store a value. A `ttl_seconds` of `None` means the entry never
    /// expires.
    fn put(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<(), PersistenceError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), PersistenceError>;

    /// List live keys beginning with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;
}

/// Read a JSON-encoded record.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a record as JSON.
pub fn put_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl_seconds: Option<i64>,
) -> Result<(), PersistenceError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw, ttl_seconds)
}

/// The read-existing-or-default, modify, write-back primitive used by
/// windows, metrics, reputation and baselines. Returns the stored value.
pub fn update_json<T, F>(
    store: &dyn KeyValueStore,
    key: &str,
    ttl_seconds: Option<i64>,
    f: F,
) -> Result<T, PersistenceError>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(T) -> T,
{
    let current: T = get_json(store, key)?.unwrap_or_default();
    let updated = f(current);
    put_json(store, key, &updated, ttl_seconds)?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u64,
    }

    fn create_test_store() -> SqliteKeyValueStore {
        SqliteKeyValueStore::in_memory().expect("Failed to create in-memory store")
    }

    #[test]
    fn test_get_json_absent() {
        let store = create_test_store();
        let value: Option<Counter> = get_json(&store, "missing").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_put_get_json_roundtrip() {
        let store = create_test_store();
        put_json(&store, "counter:a", &Counter { count: 7 }, None).unwrap();
        let value: Counter = get_json(&store, "counter:a").unwrap().unwrap();
        assert_eq!(value.count, 7);
    }

    #[test]
    fn test_update_json_starts_from_default() {
        let store = create_test_store();
        let bump = |mut c: Counter| {
            c.count += 1;
            c
        };

        let updated: Counter = update_json(&store, "counter:b", None, bump).unwrap();
        assert_eq!(updated.count, 1);

        let updated: Counter = update_json(&store, "counter:b", None, bump).unwrap();
        assert_eq!(updated.count, 2);
    }

    #[test]
    fn test_get_json_invalid_payload() {
        let store = create_test_store();
        store.put("counter:bad", "not json", None).unwrap();
        let result: Result<Option<Counter>, _> = get_json(&store, "counter:bad");
        assert!(matches!(result, Err(PersistenceError::InvalidData(_))));
    }
}
