//! Durable client-side storage.
//!
//! Two concerns share one SQLite file:
//! - the token slot, a single named key holding the bearer token
//! - query snapshots, the last good serialized value per cache key,
//!   used to seed cold cache entries (served as stale until refreshed)

mod sqlite;

use chrono::{DateTime, Utc};
use color_eyre::Result;

pub use sqlite::SqliteStorage;

/// Name of the slot that holds the bearer token.
pub const TOKEN_SLOT: &str = "session.token";

/// A single persisted credential slot.
pub trait TokenSlot: Send + Sync {
  fn read_token(&self) -> Result<Option<String>>;

  fn write_token(&self, token: &str) -> Result<()>;

  fn clear_token(&self) -> Result<()>;
}

/// Last good value stored for a cache key.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
  pub data: Vec<u8>,
  pub cached_at: DateTime<Utc>,
}

/// Trait for query snapshot backends.
pub trait SnapshotStore: Send + Sync {
  fn load_snapshot(&self, query_hash: &str) -> Result<Option<StoredSnapshot>>;

  fn save_snapshot(&self, query_hash: &str, description: &str, data: &[u8]) -> Result<()>;

  fn clear_snapshots(&self) -> Result<()>;
}

/// Snapshot storage that doesn't persist anything.
/// Used when `query.persist` is disabled.
pub struct NoopStorage;

impl SnapshotStore for NoopStorage {
  fn load_snapshot(&self, _query_hash: &str) -> Result<Option<StoredSnapshot>> {
    Ok(None) // Always miss
  }

  fn save_snapshot(&self, _query_hash: &str, _description: &str, _data: &[u8]) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear_snapshots(&self) -> Result<()> {
    Ok(())
  }
}

#[cfg(test)]
pub use memory::MemoryStorage;

#[cfg(test)]
mod memory {
  use super::*;
  use std::collections::HashMap;
  use std::sync::Mutex;

  /// In-process storage for tests.
  #[derive(Default)]
  pub struct MemoryStorage {
    token: Mutex<Option<String>>,
    snapshots: Mutex<HashMap<String, StoredSnapshot>>,
  }

  impl MemoryStorage {
    pub fn with_token(token: &str) -> Self {
      Self {
        token: Mutex::new(Some(token.to_string())),
        ..Default::default()
      }
    }

    pub fn token(&self) -> Option<String> {
      self.token.lock().unwrap().clone()
    }
  }

  impl TokenSlot for MemoryStorage {
    fn read_token(&self) -> Result<Option<String>> {
      Ok(self.token.lock().unwrap().clone())
    }

    fn write_token(&self, token: &str) -> Result<()> {
      *self.token.lock().unwrap() = Some(token.to_string());
      Ok(())
    }

    fn clear_token(&self) -> Result<()> {
      *self.token.lock().unwrap() = None;
      Ok(())
    }
  }

  impl SnapshotStore for MemoryStorage {
    fn load_snapshot(&self, query_hash: &str) -> Result<Option<StoredSnapshot>> {
      Ok(self.snapshots.lock().unwrap().get(query_hash).cloned())
    }

    fn save_snapshot(&self, query_hash: &str, _description: &str, data: &[u8]) -> Result<()> {
      self.snapshots.lock().unwrap().insert(
        query_hash.to_string(),
        StoredSnapshot {
          data: data.to_vec(),
          cached_at: Utc::now(),
        },
      );
      Ok(())
    }

    fn clear_snapshots(&self) -> Result<()> {
      self.snapshots.lock().unwrap().clear();
      Ok(())
    }
  }
}
