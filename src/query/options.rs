use std::time::Duration;

use crate::config::{EvictionConfig, QueryConfig};

/// What happens to an entry once its last subscriber detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
  /// Drop as soon as nothing is subscribed and no fetch is in flight
  Immediate,
  /// Keep for reuse until the TTL elapses, then drop on the next sweep
  Ttl(Duration),
  /// Keep for the lifetime of the client
  Never,
}

/// Opt-in retries for failed fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Additional attempts after the first failure
  pub attempts: u32,
  /// Delay before each additional attempt
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts: 0,
      backoff: Duration::from_secs(5),
    }
  }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
  /// How long a resolved entry is served without refetching
  pub stale_time: Duration,
  /// Minimum interval between focus-triggered revalidation passes
  pub focus_throttle: Duration,
  pub retry: RetryPolicy,
  pub eviction: EvictionPolicy,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(60),
      focus_throttle: Duration::from_secs(30),
      retry: RetryPolicy::default(),
      eviction: EvictionPolicy::Immediate,
    }
  }
}

impl From<&QueryConfig> for QueryOptions {
  fn from(config: &QueryConfig) -> Self {
    Self {
      stale_time: Duration::from_secs(config.stale_time_secs),
      focus_throttle: Duration::from_secs(config.focus_throttle_secs),
      retry: RetryPolicy {
        attempts: config.retry_attempts,
        backoff: Duration::from_secs(config.retry_backoff_secs),
      },
      eviction: match config.eviction {
        EvictionConfig::Immediate => EvictionPolicy::Immediate,
        EvictionConfig::Never => EvictionPolicy::Never,
        EvictionConfig::Ttl => EvictionPolicy::Ttl(Duration::from_secs(config.eviction_ttl_secs)),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_config() {
    let config = QueryConfig {
      retry_attempts: 3,
      eviction: EvictionConfig::Ttl,
      eviction_ttl_secs: 90,
      ..QueryConfig::default()
    };
    let options = QueryOptions::from(&config);
    assert_eq!(options.focus_throttle, Duration::from_secs(30));
    assert_eq!(options.retry.attempts, 3);
    assert_eq!(options.retry.backoff, Duration::from_secs(5));
    assert_eq!(options.eviction, EvictionPolicy::Ttl(Duration::from_secs(90)));
  }
}
