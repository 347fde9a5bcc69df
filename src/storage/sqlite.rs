//! SQLite-backed fingerprint history.
//!
//! Uses the same table layout as SitemonPy's `sitemonpy.db`, so an existing
//! database keeps working. Timestamps written by that tool (naive
//! `YYYY-MM-DD HH:MM:SS.ffffff`) are read back as UTC.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StorageError;
use crate::models::FingerprintRecord;
use crate::storage::{FingerprintStore, StoreResult};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS logs (
    target TEXT NOT NULL,
    hash TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_target ON logs(target);
";

/// SQLite fingerprint store.
///
/// The connection sits behind a mutex, which serializes appends coming
/// from concurrently processed targets.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    location: PathBuf,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::unavailable(path, e))?;
        }
        let conn = Connection::open(path).map_err(|e| StorageError::unavailable(path, e))?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::unavailable(":memory:", e))?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, location: PathBuf) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StorageError::unavailable(&location, e))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StorageError::unavailable(&location, e))?;

        log::debug!("Opened fingerprint store at {}", location.display());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            location,
        })
    }

    /// Where the database lives (`:memory:` for in-memory stores).
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Checkpoint the WAL and close the connection.
    pub fn close(self) -> StoreResult<()> {
        let conn = self.lock()?.take();
        if let Some(conn) = conn {
            checkpoint(&conn);
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            log::debug!("Closed fingerprint store at {}", self.location.display());
        }
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Option<Connection>>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        f(conn)
    }
}

#[async_trait]
impl FingerprintStore for SqliteStore {
    async fn last_fingerprint(&self, target: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            let hash = conn
                .query_row(
                    "SELECT hash FROM logs WHERE target = ?1 ORDER BY rowid DESC LIMIT 1",
                    params![target],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hash)
        })
    }

    async fn append(&self, record: &FingerprintRecord) -> StoreResult<()> {
        let timestamp = record
            .observed_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO logs (target, hash, timestamp) VALUES (?1, ?2, ?3)",
                params![record.target, record.fingerprint, timestamp],
            )?;
            Ok(())
        })
    }

    async fn history(&self, target: &str, limit: usize) -> StoreResult<Vec<FingerprintRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT target, hash, timestamp FROM logs
                 WHERE target = ?1 ORDER BY rowid DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![target, limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(target, fingerprint, ts)| -> StoreResult<FingerprintRecord> {
                    let observed_at = parse_timestamp(&ts).ok_or_else(|| StorageError::Corrupt {
                        target: target.clone(),
                        message: format!("unparseable timestamp '{ts}'"),
                    })?;
                    Ok(FingerprintRecord {
                        target,
                        fingerprint,
                        observed_at,
                    })
                })
                .collect()
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Merge WAL back into the main file so a single .db remains when idle.
        if let Ok(mut guard) = self.conn.lock() {
            if let Some(conn) = guard.take() {
                checkpoint(&conn);
            }
        }
    }
}

fn checkpoint(conn: &Connection) {
    if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
        log::debug!("WAL checkpoint failed: {e}");
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
