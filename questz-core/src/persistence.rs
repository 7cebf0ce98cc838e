//! Persistence layer for quest state.
//!
//! Each world shard keeps four logical stores (quests, claimed areas, player
//! assignments, cooldowns). Each is serialised to JSON and saved as one blob
//! keyed by `(shard, store)`:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS quest_state (
//!     shard      TEXT NOT NULL,
//!     store      TEXT NOT NULL,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT,
//!     PRIMARY KEY (shard, store)
//! );
//! ```
//!
//! - WAL mode for concurrent reads during gameplay.
//! - JSON inside a BLOB column keeps the schema stable as the stores evolve.
//! - Optional CRC-32 checksum detects save corruption.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use crc::{Crc, CRC_32_ISO_HDLC};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{QuestzError, Result};

/// Store holding the quest registry.
pub const QUESTS_STORE: &str = "questz_quests";
/// Store holding claimed build areas.
pub const AREAS_STORE: &str = "questz_areas";
/// Store holding player assignments and parties.
pub const PLAYERS_STORE: &str = "questz_players";
/// Store holding agent offer cooldowns.
pub const STATUS_STORE: &str = "questz_status";

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", CRC32.checksum(data))
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Opaque blob storage, one blob per `(shard, store)`.
pub trait StateStore: Send {
    /// Fetch a blob. `None` when nothing was ever saved.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    fn load_blob(&self, shard: &str, store: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite a blob.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    fn save_blob(&self, shard: &str, store: &str, data: &[u8]) -> Result<()>;

    /// Remove a blob. Returns whether one existed.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    fn delete_blob(&self, shard: &str, store: &str) -> Result<bool>;
}

/// Serialise `value` as JSON and save it.
///
/// # Errors
/// Returns [`QuestzError::Serialization`] on encoding failure, or whatever the
/// backend returns.
pub fn save_json<S, T>(store: &S, shard: &str, name: &str, value: &T) -> Result<()>
where
    S: StateStore + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_vec(value).map_err(|e| QuestzError::Serialization(e.to_string()))?;
    store.save_blob(shard, name, &json)
}

/// Load and decode a JSON blob. `None` when nothing was saved.
///
/// # Errors
/// Returns [`QuestzError::Serialization`] on decoding failure, or whatever the
/// backend returns.
pub fn load_json<S, T>(store: &S, shard: &str, name: &str) -> Result<Option<T>>
where
    S: StateStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .load_blob(shard, name)?
        .map(|data| {
            serde_json::from_slice(&data).map_err(|e| QuestzError::Serialization(e.to_string()))
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// PersistenceEngine
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS quest_state (
    shard      TEXT NOT NULL,
    store      TEXT NOT NULL,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT,
    PRIMARY KEY (shard, store)
);";

/// Handle to an open SQLite database holding quest state.
///
/// # Usage
///
/// ```no_run
/// # use questz_core::persistence::{PersistenceEngine, StateStore};
/// # use questz_core::config::PersistenceConfig;
/// let engine = PersistenceEngine::open("world_quests.db", &PersistenceConfig::default())?;
/// engine.save_blob("overworld", "questz_quests", b"{}")?;
/// let blob = engine.load_blob("overworld", "questz_quests")?;
/// # Ok::<(), questz_core::error::QuestzError>(())
/// ```
pub struct PersistenceEngine {
    conn: Mutex<Connection>,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for PersistenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersistenceEngine {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if missing. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`QuestzError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "QUESTZ persistence engine opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`QuestzError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Names of every store saved for `shard`.
    ///
    /// # Errors
    ///
    /// Returns [`QuestzError::Database`] on SQLite failures.
    pub fn list_stores(&self, shard: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT store FROM quest_state WHERE shard = ?1 ORDER BY store")?;
        let rows = stmt.query_map(params![shard], |row| row.get::<_, String>(0))?;
        let mut stores = Vec::new();
        for row in rows {
            stores.push(row?);
        }
        Ok(stores)
    }

    /// Path to the database file (or `:memory:` for in-memory DBs).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run an integrity check on the database.
    ///
    /// # Errors
    ///
    /// Returns [`QuestzError::Database`] if the check query itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl StateStore for PersistenceEngine {
    fn load_blob(&self, shard: &str, store: &str) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT data, checksum FROM quest_state WHERE shard = ?1 AND store = ?2",
        )?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![shard, store], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        shard,
                        store,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch: possible save corruption"
                    );
                }
            }
        }

        debug!(
            shard,
            store,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded quest state"
        );
        Ok(Some(data))
    }

    fn save_blob(&self, shard: &str, store: &str, data: &[u8]) -> Result<()> {
        let start = Instant::now();
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(data));
        let now = Utc::now().to_rfc3339();

        self.conn.lock().execute(
            "INSERT INTO quest_state (shard, store, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(shard, store) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![shard, store, data, now, checksum],
        )?;

        debug!(
            shard,
            store,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved quest state"
        );
        Ok(())
    }

    fn delete_blob(&self, shard: &str, store: &str) -> Result<bool> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM quest_state WHERE shard = ?1 AND store = ?2",
            params![shard, store],
        )?;
        Ok(deleted > 0)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Volatile store for tests and headless servers that do not save.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    /// Holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load_blob(&self, shard: &str, store: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .lock()
            .get(&(shard.to_string(), store.to_string()))
            .cloned())
    }

    fn save_blob(&self, shard: &str, store: &str, data: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .insert((shard.to_string(), store.to_string()), data.to_vec());
        Ok(())
    }

    fn delete_blob(&self, shard: &str, store: &str) -> Result<bool> {
        Ok(self
            .blobs
            .lock()
            .remove(&(shard.to_string(), store.to_string()))
            .is_some())
    }
}

/// Shared stores are stores too, so a test can keep a handle on what a
/// shard wrote.
impl<S: StateStore + Sync + ?Sized> StateStore for std::sync::Arc<S> {
    fn load_blob(&self, shard: &str, store: &str) -> Result<Option<Vec<u8>>> {
        (**self).load_blob(shard, store)
    }

    fn save_blob(&self, shard: &str, store: &str, data: &[u8]) -> Result<()> {
        (**self).save_blob(shard, store, data)
    }

    fn delete_blob(&self, shard: &str, store: &str) -> Result<bool> {
        (**self).delete_blob(shard, store)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PersistenceConfig {
        PersistenceConfig {
            wal_mode: false,
            checksum_enabled: true,
        }
    }

    #[test]
    fn round_trip_save_load() {
        let engine = PersistenceEngine::open_in_memory(&test_config()).expect("open");
        engine.save_blob("overworld", QUESTS_STORE, b"{\"a\":1}").expect("save");
        let loaded = engine.load_blob("overworld", QUESTS_STORE).expect("load");
        assert_eq!(loaded.as_deref(), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let engine = PersistenceEngine::open_in_memory(&test_config()).expect("open");
        assert!(engine.load_blob("overworld", AREAS_STORE).expect("load").is_none());
    }

    #[test]
    fn upsert_overwrites_and_shards_are_separate() {
        let engine = PersistenceEngine::open_in_memory(&test_config()).expect("open");
        engine.save_blob("a", STATUS_STORE, b"1").expect("save");
        engine.save_blob("a", STATUS_STORE, b"2").expect("save");
        engine.save_blob("b", STATUS_STORE, b"3").expect("save");
        assert_eq!(engine.load_blob("a", STATUS_STORE).expect("load"), Some(b"2".to_vec()));
        assert_eq!(engine.load_blob("b", STATUS_STORE).expect("load"), Some(b"3".to_vec()));
        assert_eq!(engine.list_stores("a").expect("list"), vec![STATUS_STORE.to_string()]);
    }

    #[test]
    fn delete_blob_works() {
        let engine = PersistenceEngine::open_in_memory(&test_config()).expect("open");
        engine.save_blob("a", PLAYERS_STORE, b"x").expect("save");
        assert!(engine.delete_blob("a", PLAYERS_STORE).expect("delete"));
        assert!(!engine.delete_blob("a", PLAYERS_STORE).expect("delete"));
    }

    #[test]
    fn corrupted_blob_is_still_returned() {
        let engine = PersistenceEngine::open_in_memory(&test_config()).expect("open");
        engine.save_blob("a", QUESTS_STORE, b"[1,2,3]").expect("save");
        engine
            .conn
            .lock()
            .execute(
                "UPDATE quest_state SET data = ?1 WHERE shard = 'a'",
                params![b"[9,9,9]".to_vec()],
            )
            .expect("tamper");
        let loaded = engine.load_blob("a", QUESTS_STORE).expect("load");
        assert_eq!(loaded, Some(b"[9,9,9]".to_vec()));
    }

    #[test]
    fn json_helpers_round_trip() {
        let store = MemoryStore::new();
        let value: Vec<u32> = vec![1, 2, 3];
        save_json(&store, "s", QUESTS_STORE, &value).expect("save");
        let back: Option<Vec<u32>> = load_json(&store, "s", QUESTS_STORE).expect("load");
        assert_eq!(back, Some(value));
        let missing: Option<Vec<u32>> = load_json(&store, "s", AREAS_STORE).expect("load");
        assert!(missing.is_none());
    }

    #[test]
    fn undecodable_json_is_a_serialization_error() {
        let store = MemoryStore::new();
        store.save_blob("s", QUESTS_STORE, b"not json").expect("save");
        let result: Result<Option<Vec<u32>>> = load_json(&store, "s", QUESTS_STORE);
        assert!(matches!(result, Err(QuestzError::Serialization(_))));
    }

    #[test]
    fn file_based_open_persists_across_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quests.db");
        {
            let engine = PersistenceEngine::open(&path, &PersistenceConfig::default()).expect("open");
            engine.save_blob("w", AREAS_STORE, b"[]").expect("save");
            assert!(engine.integrity_check().expect("check"));
        }
        let engine = PersistenceEngine::open(&path, &PersistenceConfig::default()).expect("reopen");
        assert_eq!(engine.load_blob("w", AREAS_STORE).expect("load"), Some(b"[]".to_vec()));
    }

    #[test]
    fn crc32_matches_reference() {
        assert_eq!(crc32_hex(b"123456789"), "cbf43926");
    }
}
