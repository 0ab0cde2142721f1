// =============================================================================
// Time-Series Store Adapter - TTL-evicting key-value store shared by the fleet
// =============================================================================
//
// Every worker process writes its observations here and reads only its own
// back. The contract is deliberately small:
//
//   put(key, fields, ttl)   write a field map that expires after `ttl`
//   get(key)                read a field map; expired entries are absent
//   keys(prefix)            enumerate keys; NOT filtered by expiry
//
// Enumeration is not synchronous with eviction: `keys` may return a key whose
// entry has already expired, in which case the subsequent `get` returns None
// and callers treat it as a normal gap.
//
// The SQLite backing runs in WAL mode so that many worker processes can share
// one database file.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Field map stored under a single key, mirroring a hash-style store entry.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Store infrastructure failure. Read-side misses are `Ok(None)`, never an
/// error; the caller's next cycle is the retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Contract over the shared expiring key-value store.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Write `fields` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, fields: &Fields, ttl: Duration) -> Result<(), StoreError>;

    /// Read the field map under `key`. Expired or missing entries are `None`.
    async fn get(&self, key: &str) -> Result<Option<Fields>, StoreError>;

    /// Enumerate every key starting with `prefix`, in no particular order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// SQLite-backed [`TtlStore`].
pub struct SqliteTtlStore {
    conn: Mutex<Connection>,
}

impl SqliteTtlStore {
    /// Open (or create) the store at `path`, creating parent directories as
    /// needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL allows concurrent readers/writers across worker processes.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                fields     TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl TtlStore for SqliteTtlStore {
    async fn put(&self, key: &str, fields: &Fields, ttl: Duration) -> Result<(), StoreError> {
        let payload = serde_json::Value::Object(fields.clone()).to_string();
        let now = Self::now_millis();
        let expires_at = now + ttl.as_millis() as i64;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, fields, expires_at) VALUES (?1, ?2, ?3)",
            params![key, payload, expires_at],
        )?;
        // Opportunistic eviction; enumeration may still see rows that expire
        // between this purge and the next.
        conn.execute("DELETE FROM kv WHERE expires_at <= ?1", params![now])?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Fields>, StoreError> {
        let payload: Option<String> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT fields FROM kv WHERE key = ?1 AND expires_at > ?2",
                params![key, Self::now_millis()],
                |row| row.get(0),
            )
            .optional()?
        };

        match payload {
            None => Ok(None),
            Some(text) => match serde_json::from_str(&text)? {
                serde_json::Value::Object(map) => Ok(Some(map)),
                _ => Err(StoreError::Unavailable(format!(
                    "corrupt field payload under key {key}"
                ))),
            },
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // Keys in this crate are `observation:{uuid}:{millis}`; no LIKE
        // wildcard characters can occur in a prefix.
        let pattern = format!("{prefix}%");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE key LIKE ?1")?;
        let keys = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: &[(&str, serde_json::Value)]) -> Fields {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn open_temp_store() -> (tempfile::TempDir, SqliteTtlStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTtlStore::open(dir.path().join("store.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let (_dir, store) = open_temp_store();
        let entry = fields(&[
            ("midPrice", serde_json::json!(100.5)),
            ("tradeSignal", serde_json::json!("BUY")),
        ]);

        store
            .put("observation:a:1", &entry, Duration::from_secs(60))
            .await
            .unwrap();

        let read = store.get("observation:a:1").await.unwrap().unwrap();
        assert_eq!(read, entry);
    }

    #[tokio::test]
    async fn missing_key_is_absent_not_error() {
        let (_dir, store) = open_temp_store();
        assert!(store.get("observation:nope:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_unreadable() {
        let (_dir, store) = open_temp_store();
        let entry = fields(&[("midPrice", serde_json::json!(1.0))]);

        store
            .put("observation:a:1", &entry, Duration::from_secs(0))
            .await
            .unwrap();

        assert!(store.get("observation:a:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_enumerates_by_prefix() {
        let (_dir, store) = open_temp_store();
        let entry = fields(&[("midPrice", serde_json::json!(1.0))]);
        let ttl = Duration::from_secs(60);

        store.put("observation:a:1", &entry, ttl).await.unwrap();
        store.put("observation:a:2", &entry, ttl).await.unwrap();
        store.put("observation:b:1", &entry, ttl).await.unwrap();

        let mut keys = store.keys("observation:a:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["observation:a:1", "observation:a:2"]);
    }

    #[tokio::test]
    async fn overwrite_replaces_fields() {
        let (_dir, store) = open_temp_store();
        let ttl = Duration::from_secs(60);

        store
            .put("k", &fields(&[("v", serde_json::json!(1))]), ttl)
            .await
            .unwrap();
        store
            .put("k", &fields(&[("v", serde_json::json!(2))]), ttl)
            .await
            .unwrap();

        let read = store.get("k").await.unwrap().unwrap();
        assert_eq!(read["v"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn shared_file_visible_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let writer = SqliteTtlStore::open(&path).unwrap();
        let reader = SqliteTtlStore::open(&path).unwrap();

        writer
            .put(
                "observation:a:1",
                &fields(&[("midPrice", serde_json::json!(42.0))]),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let read = reader.get("observation:a:1").await.unwrap().unwrap();
        assert_eq!(read["midPrice"], serde_json::json!(42.0));
    }
}
