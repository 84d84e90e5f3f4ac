//! SQLite implementation of the token slot and snapshot store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SnapshotStore, StoredSnapshot, TokenSlot, TOKEN_SLOT};

/// SQLite-based client storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the store in the given data directory, creating it if needed.
  pub fn open(data_dir: &Path) -> Result<Self> {
    std::fs::create_dir_all(data_dir)
      .map_err(|e| eyre!("Failed to create data directory: {}", e))?;

    Self::open_at(&Self::db_path(data_dir))
  }

  /// Open the store at an explicit database file.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("sportal.db")
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

const SCHEMA: &str = r#"
-- Named single-value slots (the session token lives here)
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Last good value per query fingerprint
CREATE TABLE IF NOT EXISTS query_snapshot (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl TokenSlot for SqliteStorage {
  fn read_token(&self) -> Result<Option<String>> {
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT value FROM kv WHERE key = ?",
        params![TOKEN_SLOT],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read token slot: {}", e))
  }

  fn write_token(&self, token: &str) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![TOKEN_SLOT, token],
      )
      .map_err(|e| eyre!("Failed to write token slot: {}", e))?;

    Ok(())
  }

  fn clear_token(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM kv WHERE key = ?", params![TOKEN_SLOT])
      .map_err(|e| eyre!("Failed to clear token slot: {}", e))?;

    Ok(())
  }
}

impl SnapshotStore for SqliteStorage {
  fn load_snapshot(&self, query_hash: &str) -> Result<Option<StoredSnapshot>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM query_snapshot WHERE query_hash = ?",
        params![query_hash],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot: {}", e))?;

    match row {
      Some((data, cached_at)) => Ok(Some(StoredSnapshot {
        data,
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn save_snapshot(&self, query_hash: &str, description: &str, data: &[u8]) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO query_snapshot (query_hash, query_description, data, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![query_hash, description, data],
      )
      .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    Ok(())
  }

  fn clear_snapshots(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM query_snapshot", [])
      .map_err(|e| eyre!("Failed to clear snapshots: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
