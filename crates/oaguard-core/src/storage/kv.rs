use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;

/// Persistent key/value store backing the extension's shared state.
/// Callers namespace their keys with a fixed prefix so unrelated state can
/// live in the same store.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Upsert.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Enumerate keys in a namespace, for maintenance passes.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key")?;
        let keys = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Delete every key in a namespace; returns the number removed.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let pattern = format!("{}%", escape_like(prefix));
        let removed = self.conn.execute(
            "DELETE FROM kv WHERE key LIKE ?1 ESCAPE '\\'",
            params![pattern],
        )?;
        Ok(removed)
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let store = KvStore::open_in_memory().unwrap();
        store.put("oa_cache_10.1000/xyz", "{}").unwrap();
        assert_eq!(
            store.get("oa_cache_10.1000/xyz").unwrap(),
            Some("{}".to_string())
        );
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn put_overwrites() {
        let store = KvStore::open_in_memory().unwrap();
        store.put("k", "a").unwrap();
        store.put("k", "b").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("b".to_string()));
    }

    #[test]
    fn prefix_enumeration_is_scoped() {
        let store = KvStore::open_in_memory().unwrap();
        store.put("oa_cache_10.1/a", "1").unwrap();
        store.put("oa_cache_10.1/b", "2").unwrap();
        store.put("settings_theme", "dark").unwrap();

        let keys = store.keys_with_prefix("oa_cache_").unwrap();
        assert_eq!(keys, vec!["oa_cache_10.1/a", "oa_cache_10.1/b"]);

        let removed = store.delete_prefix("oa_cache_").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.get("settings_theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn like_wildcards_in_keys_do_not_leak() {
        let store = KvStore::open_in_memory().unwrap();
        store.put("ns_a", "1").unwrap();
        store.put("nsxa", "2").unwrap();

        // '_' in the prefix must match literally, not as a LIKE wildcard.
        let keys = store.keys_with_prefix("ns_").unwrap();
        assert_eq!(keys, vec!["ns_a"]);
    }

    #[test]
    fn opens_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("cache.db");
        let store = KvStore::open(&path).unwrap();
        store.put("k", "v").unwrap();
        drop(store);

        let reopened = KvStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap(), Some("v".to_string()));
    }
}
