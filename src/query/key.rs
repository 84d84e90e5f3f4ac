use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

/// A logical request: resource name plus parameters.
///
/// Two keys with the same `cache_hash` address the same cache entry.
pub trait QueryKey {
  /// Deterministic fingerprint of resource + parameters
  fn cache_hash(&self) -> String;

  /// Human-readable description for logs and the snapshot table
  fn description(&self) -> String;
}

/// Values that can live in the query cache.
///
/// Serde bounds let resolved values be written to the snapshot store.
pub trait QueryData: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> QueryData for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// SHA256 hex digest of a normalized key string, for stable fixed-length keys.
pub fn fingerprint(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fingerprint_is_stable_hex() {
    let a = fingerprint("dispatch_orders:page=1");
    assert_eq!(a, fingerprint("dispatch_orders:page=1"));
    assert_eq!(a.len(), 64);
    assert_ne!(a, fingerprint("dispatch_orders:page=2"));
  }
}
