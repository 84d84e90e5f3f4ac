//! Process-wide keyed query cache.
//!
//! Every cache mutation goes through [`QueryClient`]: subscriptions,
//! fetch resolutions, refetches and mutations. Each entry carries a
//! monotonic generation counter; a resolution is applied only if its
//! generation is still the latest one issued for that key.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::key::{QueryData, QueryKey};
use super::options::{EvictionPolicy, QueryOptions, RetryPolicy};
use crate::error::PortalError;
use crate::storage::{NoopStorage, SnapshotStore};

type Value = Arc<dyn Any + Send + Sync>;
type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Resolved, PortalError>> + Send + Sync>;

/// A successful fetch, type-erased.
struct Resolved {
  value: Value,
  /// Serialized form for the snapshot store
  encoded: Option<Vec<u8>>,
}

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  /// Created but never fetched
  Idle,
  /// A fetch or mutation is in flight
  Pending,
  Resolved,
  Errored,
}

enum InFlight {
  Fetch(JoinHandle<()>),
  Mutation,
}

struct Entry {
  /// Distinguishes this entry from a later one under the same hash
  id: u64,
  description: String,
  data: Option<Value>,
  error: Option<PortalError>,
  fetched_at: Option<Instant>,
  state: EntryState,
  generation: u64,
  in_flight: Option<InFlight>,
  /// Most recently registered fetcher, used for revalidation
  fetcher: Option<ErasedFetcher>,
  subscribers: usize,
  detached_at: Option<Instant>,
  version: watch::Sender<u64>,
}

impl Entry {
  fn new(id: u64, description: String) -> Self {
    let (version, _) = watch::channel(0);
    Self {
      id,
      description,
      data: None,
      error: None,
      fetched_at: None,
      state: EntryState::Idle,
      generation: 0,
      in_flight: None,
      fetcher: None,
      subscribers: 0,
      detached_at: None,
      version,
    }
  }

  fn is_stale(&self, stale_time: Duration) -> bool {
    self
      .fetched_at
      .map(|t| t.elapsed() > stale_time)
      .unwrap_or(true)
  }

  fn is_fresh(&self, stale_time: Duration) -> bool {
    self.state == EntryState::Resolved && !self.is_stale(stale_time)
  }

  fn notify(&self) {
    self.version.send_modify(|v| *v = v.wrapping_add(1));
  }

  fn abort_fetch(&mut self) {
    if let Some(InFlight::Fetch(handle)) = self.in_flight.take() {
      handle.abort();
    }
  }
}

fn downcast<T: Send + Sync + 'static>(value: &Value) -> Option<Arc<T>> {
  Arc::clone(value).downcast::<T>().ok()
}

/// Point-in-time view of a cache entry
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
  pub data: Option<Arc<T>>,
  pub error: Option<PortalError>,
  pub state: EntryState,
  pub fetched_at: Option<Instant>,
  pub is_stale: bool,
}

impl<T> QuerySnapshot<T> {
  fn missing() -> Self {
    Self {
      data: None,
      error: None,
      state: EntryState::Idle,
      fetched_at: None,
      is_stale: true,
    }
  }

  /// Nothing to show yet
  pub fn is_loading(&self) -> bool {
    self.state == EntryState::Pending && self.data.is_none()
  }

  /// Showing data while a refresh runs
  pub fn is_refreshing(&self) -> bool {
    self.state == EntryState::Pending && self.data.is_some()
  }
}

struct Inner {
  entries: Mutex<HashMap<String, Entry>>,
  options: QueryOptions,
  snapshots: Arc<dyn SnapshotStore>,
  last_focus_revalidation: Mutex<Option<Instant>>,
  next_entry_id: AtomicU64,
}

impl Inner {
  fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
    self
      .entries
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn new_entry(&self, description: String) -> Entry {
    Entry::new(self.next_entry_id.fetch_add(1, Ordering::Relaxed), description)
  }

  /// Seed a cold entry from the snapshot store.
  fn seed<T: QueryData>(&self, hash: &str, entry: &mut Entry) {
    match self.snapshots.load_snapshot(hash) {
      Ok(Some(snapshot)) => match serde_json::from_slice::<T>(&snapshot.data) {
        Ok(value) => {
          debug!(key = %entry.description, cached_at = %snapshot.cached_at, "seeded from snapshot");
          entry.data = Some(Arc::new(value));
        }
        Err(e) => warn!(key = %entry.description, error = %e, "discarding unreadable snapshot"),
      },
      Ok(None) => {}
      Err(e) => warn!(key = %entry.description, error = %e, "snapshot lookup failed"),
    }
  }

  fn snapshot<T: QueryData>(&self, hash: &str) -> QuerySnapshot<T> {
    let entries = self.lock_entries();
    let Some(entry) = entries.get(hash) else {
      return QuerySnapshot::missing();
    };

    QuerySnapshot {
      data: entry.data.as_ref().and_then(downcast::<T>),
      error: entry.error.clone(),
      state: entry.state,
      fetched_at: entry.fetched_at,
      is_stale: entry.is_stale(self.options.stale_time),
    }
  }

  /// Apply a fetch result if `generation` is still current.
  fn resolve(&self, hash: &str, generation: u64, result: Result<Resolved, PortalError>) {
    let mut entries = self.lock_entries();
    let Some(entry) = entries.get_mut(hash) else {
      debug!(generation, "entry evicted before resolution, dropping result");
      return;
    };

    if entry.generation != generation {
      debug!(
        key = %entry.description,
        generation,
        current = entry.generation,
        "discarding superseded resolution"
      );
      return;
    }

    entry.in_flight = None;
    let mut to_persist = None;
    match result {
      Ok(resolved) => {
        debug!(key = %entry.description, generation, "fetch resolved");
        entry.data = Some(resolved.value);
        entry.error = None;
        entry.fetched_at = Some(Instant::now());
        entry.state = EntryState::Resolved;
        to_persist = resolved
          .encoded
          .map(|bytes| (entry.description.clone(), bytes));
      }
      Err(error) => {
        // Last good data stays in place
        warn!(key = %entry.description, generation, %error, "fetch failed");
        entry.error = Some(error);
        entry.state = EntryState::Errored;
      }
    }
    entry.notify();

    let evict = entry.subscribers == 0 && self.options.eviction == EvictionPolicy::Immediate;
    if evict {
      entries.remove(hash);
    }
    drop(entries);

    if let Some((description, bytes)) = to_persist {
      if let Err(e) = self.snapshots.save_snapshot(hash, &description, &bytes) {
        warn!(key = %description, error = %e, "failed to persist snapshot");
      }
    }
  }

  fn detach(&self, hash: &str, entry_id: u64) {
    let mut entries = self.lock_entries();
    // The entry may have been cleared and recreated since this subscriber joined
    let Some(entry) = entries.get_mut(hash).filter(|entry| entry.id == entry_id) else {
      return;
    };

    entry.subscribers = entry.subscribers.saturating_sub(1);
    if entry.subscribers > 0 {
      return;
    }

    entry.detached_at = Some(Instant::now());
    // An in-flight fetch is left to finish; resolve() evicts afterwards
    if self.options.eviction == EvictionPolicy::Immediate && entry.in_flight.is_none() {
      debug!(key = %entry.description, "last subscriber detached, evicting");
      entries.remove(hash);
    }
  }
}

/// Start a fetch for `entry`, superseding any fetch already in flight.
fn start_fetch(inner: &Arc<Inner>, hash: &str, entry: &mut Entry) -> bool {
  let Some(fetcher) = entry.fetcher.clone() else {
    return false;
  };

  entry.abort_fetch();
  entry.generation += 1;
  entry.state = EntryState::Pending;
  entry.notify();

  let generation = entry.generation;
  debug!(key = %entry.description, generation, "fetch started");

  let retry = inner.options.retry;
  let task_inner = Arc::clone(inner);
  let hash = hash.to_string();
  let handle = tokio::spawn(async move {
    let result = fetch_with_retry(&fetcher, retry).await;
    task_inner.resolve(&hash, generation, result);
  });
  entry.in_flight = Some(InFlight::Fetch(handle));
  true
}

/// Run the fetcher, retrying sequentially when the policy allows.
async fn fetch_with_retry(
  fetcher: &ErasedFetcher,
  retry: RetryPolicy,
) -> Result<Resolved, PortalError> {
  let mut attempt = 0;
  loop {
    match fetcher().await {
      Ok(resolved) => return Ok(resolved),
      // A rejected session won't recover by retrying
      Err(error) if attempt < retry.attempts && !error.is_session_invalid() => {
        attempt += 1;
        debug!(attempt, %error, "fetch failed, retrying after backoff");
        tokio::time::sleep(retry.backoff).await;
      }
      Err(error) => return Err(error),
    }
  }
}

fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
  T: QueryData,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, PortalError>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move {
      let value = fut.await?;
      let encoded = match serde_json::to_vec(&value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
          warn!(error = %e, "value not serializable, skipping snapshot");
          None
        }
      };
      Ok::<_, PortalError>(Resolved {
        value: Arc::new(value),
        encoded,
      })
    }
    .boxed()
  })
}

/// Keyed request cache with deduplication and revalidation.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Inner>,
}

impl QueryClient {
  pub fn new(options: QueryOptions) -> Self {
    Self::with_snapshots(options, Arc::new(NoopStorage))
  }

  pub fn with_snapshots(options: QueryOptions, snapshots: Arc<dyn SnapshotStore>) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        options,
        snapshots,
        last_focus_revalidation: Mutex::new(None),
        next_entry_id: AtomicU64::new(0),
      }),
    }
  }

  /// Register interest in `key`.
  ///
  /// A fresh entry is served as-is. Otherwise `fetcher` runs, unless a
  /// fetch for the same key is already in flight, in which case the new
  /// subscriber joins it.
  pub fn subscribe<T, K, F, Fut>(&self, key: &K, fetcher: F) -> Subscription<T>
  where
    T: QueryData,
    K: QueryKey + ?Sized,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, PortalError>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let erased = erase(fetcher);

    let mut entries = self.inner.lock_entries();
    let entry = entries.entry(hash.clone()).or_insert_with(|| {
      let mut entry = self.inner.new_entry(key.description());
      self.inner.seed::<T>(&hash, &mut entry);
      entry
    });

    entry.fetcher = Some(erased);
    entry.subscribers += 1;
    entry.detached_at = None;
    let entry_id = entry.id;
    let rx = entry.version.subscribe();

    if entry.in_flight.is_some() {
      debug!(key = %entry.description, "joining in-flight request");
    } else if entry.is_fresh(self.inner.options.stale_time) {
      debug!(key = %entry.description, "serving fresh entry");
    } else {
      start_fetch(&self.inner, &hash, entry);
    }
    drop(entries);

    Subscription {
      client: self.clone(),
      hash,
      entry_id,
      rx,
      _marker: PhantomData,
    }
  }

  /// Force a new fetch for `key`, superseding any in flight.
  pub fn refetch<K: QueryKey + ?Sized>(&self, key: &K) -> bool {
    self.refetch_hash(&key.cache_hash())
  }

  fn refetch_hash(&self, hash: &str) -> bool {
    let mut entries = self.inner.lock_entries();
    match entries.get_mut(hash) {
      Some(entry) => start_fetch(&self.inner, hash, entry),
      None => false,
    }
  }

  /// Mark `key` stale; refetch now if anyone is watching it.
  pub fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) {
    let hash = key.cache_hash();
    let mut entries = self.inner.lock_entries();
    if let Some(entry) = entries.get_mut(&hash) {
      entry.fetched_at = None;
      if entry.subscribers > 0 && entry.in_flight.is_none() {
        start_fetch(&self.inner, &hash, entry);
      }
    }
  }

  /// Revalidate every watched entry after the terminal regains focus.
  ///
  /// Throttled: returns false without doing anything if the previous pass
  /// ran less than `focus_throttle` ago.
  pub fn on_focus(&self) -> bool {
    let now = Instant::now();
    {
      let mut last = self
        .inner
        .last_focus_revalidation
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
      if let Some(previous) = *last {
        if now.duration_since(previous) < self.inner.options.focus_throttle {
          debug!("focus revalidation throttled");
          return false;
        }
      }
      *last = Some(now);
    }

    let mut entries = self.inner.lock_entries();
    let mut started = 0;
    for (hash, entry) in entries.iter_mut() {
      if entry.subscribers > 0 && entry.in_flight.is_none() && start_fetch(&self.inner, hash, entry)
      {
        started += 1;
      }
    }
    debug!(started, "focus revalidation");
    true
  }

  /// Caller-driven update of `key`.
  ///
  /// `optimistic` may replace the data before `action` runs. When `action`
  /// yields a value it becomes the new data; `None` triggers a revalidation.
  /// On failure the data rolls back to what it was before the mutation.
  pub async fn mutate<T, K, O, Fut>(
    &self,
    key: &K,
    optimistic: O,
    action: Fut,
  ) -> Result<(), PortalError>
  where
    T: QueryData,
    K: QueryKey + ?Sized,
    O: FnOnce(Option<&T>) -> Option<T>,
    Fut: Future<Output = Result<Option<T>, PortalError>>,
  {
    let hash = key.cache_hash();

    let (generation, prior) = {
      let mut entries = self.inner.lock_entries();
      let entry = entries.entry(hash.clone()).or_insert_with(|| {
        let mut entry = self.inner.new_entry(key.description());
        entry.detached_at = Some(Instant::now());
        entry
      });

      let prior = entry.data.clone();
      let current = prior.as_ref().and_then(downcast::<T>);
      if let Some(next) = optimistic(current.as_deref()) {
        entry.data = Some(Arc::new(next));
      }

      entry.abort_fetch();
      entry.generation += 1;
      entry.in_flight = Some(InFlight::Mutation);
      entry.state = EntryState::Pending;
      entry.notify();
      debug!(key = %entry.description, generation = entry.generation, "mutation started");
      (entry.generation, prior)
    };

    let outcome = action.await;

    let mut entries = self.inner.lock_entries();
    let Some(entry) = entries.get_mut(&hash) else {
      return outcome.map(|_| ());
    };
    if entry.generation != generation {
      debug!(key = %entry.description, generation, "mutation superseded");
      return outcome.map(|_| ());
    }

    entry.in_flight = None;
    let result = match outcome {
      Ok(Some(value)) => {
        entry.data = Some(Arc::new(value));
        entry.error = None;
        entry.fetched_at = Some(Instant::now());
        entry.state = EntryState::Resolved;
        entry.notify();
        Ok(())
      }
      Ok(None) => {
        // Nobody has registered a fetcher yet: leave the entry stale so the
        // first subscriber fetches
        if !start_fetch(&self.inner, &hash, entry) {
          entry.error = None;
          entry.fetched_at = None;
          entry.state = if entry.data.is_some() {
            EntryState::Resolved
          } else {
            EntryState::Idle
          };
          entry.notify();
        }
        Ok(())
      }
      Err(error) => {
        warn!(key = %entry.description, %error, "mutation failed, rolling back");
        entry.data = prior;
        entry.error = Some(error.clone());
        entry.state = EntryState::Errored;
        entry.notify();
        Err(error)
      }
    };

    if entry.subscribers == 0
      && entry.in_flight.is_none()
      && self.inner.options.eviction == EvictionPolicy::Immediate
    {
      entries.remove(&hash);
    }
    result
  }

  /// Drop detached entries whose TTL has elapsed. Returns how many went.
  pub fn sweep(&self) -> usize {
    let EvictionPolicy::Ttl(ttl) = self.inner.options.eviction else {
      return 0;
    };

    let now = Instant::now();
    let mut entries = self.inner.lock_entries();
    let before = entries.len();
    entries.retain(|_, entry| {
      let expired = entry.subscribers == 0
        && entry.in_flight.is_none()
        && entry
          .detached_at
          .is_some_and(|at| now.duration_since(at) >= ttl);
      !expired
    });

    let evicted = before - entries.len();
    if evicted > 0 {
      debug!(evicted, "swept expired entries");
    }
    evicted
  }

  /// Forget everything, including persisted snapshots. Used on logout.
  pub fn clear(&self) {
    let mut entries = self.inner.lock_entries();
    for entry in entries.values_mut() {
      entry.abort_fetch();
    }
    entries.clear();
    drop(entries);

    *self
      .inner
      .last_focus_revalidation
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;

    if let Err(e) = self.inner.snapshots.clear_snapshots() {
      warn!(error = %e, "failed to clear snapshots");
    }
  }

  pub fn len(&self) -> usize {
    self.inner.lock_entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// A view's handle on one cache entry.
///
/// Dropping it detaches from the entry without cancelling a fetch that
/// other subscribers share.
pub struct Subscription<T> {
  client: QueryClient,
  hash: String,
  entry_id: u64,
  rx: watch::Receiver<u64>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: QueryData> Subscription<T> {
  pub fn snapshot(&self) -> QuerySnapshot<T> {
    self.client.inner.snapshot(&self.hash)
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.snapshot().data
  }

  /// Returns `true` if the entry changed since the last poll.
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    match self.rx.has_changed() {
      Ok(true) => {
        self.rx.borrow_and_update();
        true
      }
      _ => false,
    }
  }

  /// Wait for the next change. Returns false if the entry was dropped.
  pub async fn changed(&mut self) -> bool {
    self.rx.changed().await.is_ok()
  }

  pub fn refetch(&self) -> bool {
    self.client.refetch_hash(&self.hash)
  }
}

impl<T> Drop for Subscription<T> {
  fn drop(&mut self) {
    self.client.inner.detach(&self.hash, self.entry_id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;
  use std::sync::atomic::AtomicU32;

  struct TestKey(&'static str);

  impl QueryKey for TestKey {
    fn cache_hash(&self) -> String {
      format!("test:{}", self.0)
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
  }

  /// Fetcher that counts calls and returns `value` after a short delay
  fn counting<T: QueryData>(
    calls: &Arc<AtomicU32>,
    value: T,
  ) -> impl Fn() -> BoxFuture<'static, Result<T, PortalError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      let value = value.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, PortalError>(value)
      }
      .boxed()
    }
  }

  async fn settled<T: QueryData>(sub: &mut Subscription<T>) -> QuerySnapshot<T> {
    loop {
      let snapshot = sub.snapshot();
      if snapshot.state != EntryState::Pending {
        return snapshot;
      }
      assert!(sub.changed().await, "entry dropped while waiting");
    }
  }

  #[tokio::test]
  async fn test_concurrent_subscribers_share_one_fetch() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();

    let mut subs: Vec<Subscription<u32>> = (0..5)
      .map(|_| client.subscribe(&TestKey("orders"), counting(&calls, 42)))
      .collect();

    for sub in subs.iter_mut() {
      let snapshot = settled(sub).await;
      assert_eq!(snapshot.data.as_deref(), Some(&42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fresh_entry_served_without_fetch() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();

    let mut first = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    settled(&mut first).await;

    let second = client.subscribe(&TestKey("orders"), counting(&calls, 2u32));
    let snapshot = second.snapshot();
    assert_eq!(snapshot.state, EntryState::Resolved);
    assert_eq!(snapshot.data.as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failed_revalidation_keeps_stale_data() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let calls_in = Arc::clone(&calls);

    let mut sub = client.subscribe(&TestKey("ledger"), move || {
      let n = calls_in.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          Ok(7u32)
        } else {
          Err(PortalError::FetchFailed("gateway timeout".to_string()))
        }
      }
    });
    assert_eq!(settled(&mut sub).await.data.as_deref(), Some(&7));

    assert!(sub.refetch());
    let snapshot = settled(&mut sub).await;
    assert_eq!(snapshot.state, EntryState::Errored);
    assert_eq!(snapshot.data.as_deref(), Some(&7));
    assert!(matches!(snapshot.error, Some(PortalError::FetchFailed(_))));
  }

  #[tokio::test]
  async fn test_success_clears_previous_error() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let calls_in = Arc::clone(&calls);

    let mut sub = client.subscribe(&TestKey("returns"), move || {
      let n = calls_in.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          Err(PortalError::FetchFailed("down".to_string()))
        } else {
          Ok(3u32)
        }
      }
    });
    assert!(settled(&mut sub).await.error.is_some());

    sub.refetch();
    let snapshot = settled(&mut sub).await;
    assert_eq!(snapshot.data.as_deref(), Some(&3));
    assert!(snapshot.error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_later_request_wins_over_slower_earlier_one() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let calls_in = Arc::clone(&calls);

    let mut sub = client.subscribe(&TestKey("orders"), move || {
      let n = calls_in.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          tokio::time::sleep(Duration::from_millis(100)).await;
          Ok::<_, PortalError>("A".to_string())
        } else {
          tokio::time::sleep(Duration::from_millis(10)).await;
          Ok("B".to_string())
        }
      }
    });

    tokio::time::sleep(Duration::from_millis(1)).await;
    sub.refetch();

    assert_eq!(settled(&mut sub).await.data.as_deref().map(String::as_str), Some("B"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sub.data().as_deref().map(String::as_str), Some("B"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_superseded_generation_is_discarded() {
    let client = QueryClient::new(QueryOptions::default());
    let sub: Subscription<u32> =
      client.subscribe(&TestKey("orders"), || std::future::pending::<Result<u32, PortalError>>());
    let hash = TestKey("orders").cache_hash();

    client.inner.resolve(
      &hash,
      0,
      Ok(Resolved {
        value: Arc::new(1u32),
        encoded: None,
      }),
    );
    assert_eq!(sub.snapshot().data, None);
    assert_eq!(sub.snapshot().state, EntryState::Pending);

    client.inner.resolve(
      &hash,
      1,
      Ok(Resolved {
        value: Arc::new(2u32),
        encoded: None,
      }),
    );
    assert_eq!(sub.snapshot().data.as_deref(), Some(&2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_not_retried_by_default() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let calls_in = Arc::clone(&calls);

    let mut sub = client.subscribe(&TestKey("orders"), move || {
      calls_in.fetch_add(1, Ordering::SeqCst);
      async { Err::<u32, _>(PortalError::FetchFailed("down".to_string())) }
    });
    settled(&mut sub).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_opt_in_retry_waits_for_backoff() {
    let options = QueryOptions {
      retry: RetryPolicy {
        attempts: 2,
        backoff: Duration::from_secs(5),
      },
      ..QueryOptions::default()
    };
    let client = QueryClient::new(options);
    let calls = counter();
    let calls_in = Arc::clone(&calls);

    let mut sub = client.subscribe(&TestKey("orders"), move || {
      let n = calls_in.fetch_add(1, Ordering::SeqCst);
      async move {
        if n < 2 {
          Err(PortalError::FetchFailed("flaky".to_string()))
        } else {
          Ok(9u32)
        }
      }
    });

    tokio::task::yield_now().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let snapshot = settled(&mut sub).await;
    assert_eq!(snapshot.data.as_deref(), Some(&9));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_focus_revalidation_is_throttled() {
    let client = QueryClient::new(QueryOptions {
      stale_time: Duration::from_secs(3600),
      ..QueryOptions::default()
    });
    let calls = counter();

    let mut sub = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    settled(&mut sub).await;

    assert!(client.on_focus());
    settled(&mut sub).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    for _ in 0..10 {
      assert!(!client.on_focus());
    }
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!client.on_focus());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert!(client.on_focus());
    settled(&mut sub).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_mutation_rolls_back_on_failure() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let mut sub = client.subscribe(&TestKey("returns"), counting(&calls, vec![1u32, 2]));
    settled(&mut sub).await;

    let (release, gate) = tokio::sync::oneshot::channel::<()>();
    let mutating = client.clone();
    let handle = tokio::spawn(async move {
      mutating
        .mutate(
          &TestKey("returns"),
          |current: Option<&Vec<u32>>| {
            current.map(|items| {
              let mut items = items.clone();
              items.push(3);
              items
            })
          },
          async move {
            let _ = gate.await;
            Err::<Option<Vec<u32>>, _>(PortalError::FetchFailed("rejected".to_string()))
          },
        )
        .await
    });

    tokio::task::yield_now().await;
    assert_eq!(sub.data().as_deref(), Some(&vec![1, 2, 3]));

    release.send(()).unwrap();
    let result = handle.await.unwrap();
    assert!(result.is_err());

    let snapshot = sub.snapshot();
    assert_eq!(snapshot.data.as_deref(), Some(&vec![1, 2]));
    assert_eq!(snapshot.state, EntryState::Errored);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_mutation_without_value_revalidates() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let mut sub = client.subscribe(&TestKey("returns"), counting(&calls, 5u32));
    settled(&mut sub).await;

    client
      .mutate(
        &TestKey("returns"),
        |_: Option<&u32>| Some(6),
        async { Ok(None) },
      )
      .await
      .unwrap();

    let snapshot = settled(&mut sub).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(snapshot.data.as_deref(), Some(&5));
  }

  #[tokio::test]
  async fn test_mutation_with_value_replaces_data() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();
    let mut sub = client.subscribe(&TestKey("returns"), counting(&calls, 5u32));
    settled(&mut sub).await;

    client
      .mutate(&TestKey("returns"), |_: Option<&u32>| None, async { Ok(Some(8u32)) })
      .await
      .unwrap();

    assert_eq!(sub.data().as_deref(), Some(&8));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_resubscribe_after_eviction_is_cold() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();

    let mut sub = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    settled(&mut sub).await;
    drop(sub);
    assert!(client.is_empty());

    let mut again = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    assert!(again.snapshot().is_loading());
    settled(&mut again).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_detach_does_not_cancel_shared_fetch() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();

    let first = client.subscribe(&TestKey("orders"), counting(&calls, 4u32));
    let mut second = client.subscribe(&TestKey("orders"), counting(&calls, 4u32));
    drop(first);

    assert_eq!(settled(&mut second).await.data.as_deref(), Some(&4));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_immediate_eviction_waits_for_in_flight_fetch() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();

    let sub = client.subscribe(&TestKey("orders"), counting(&calls, 4u32));
    drop(sub);
    assert_eq!(client.len(), 1);

    // Rejoining during the in-flight window doesn't start a second request
    let mut rejoined = client.subscribe(&TestKey("orders"), counting(&calls, 4u32));
    settled(&mut rejoined).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_ttl_sweep() {
    let client = QueryClient::new(QueryOptions {
      eviction: EvictionPolicy::Ttl(Duration::from_secs(60)),
      ..QueryOptions::default()
    });
    let calls = counter();

    let mut sub = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    settled(&mut sub).await;
    drop(sub);

    assert_eq!(client.sweep(), 0);
    let reused = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    assert_eq!(reused.snapshot().state, EntryState::Resolved);
    drop(reused);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(client.sweep(), 1);
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_cold_entry_seeded_from_snapshot() {
    let storage = Arc::new(MemoryStorage::default());
    let calls = counter();

    let first = QueryClient::with_snapshots(QueryOptions::default(), storage.clone());
    let mut sub = first.subscribe(&TestKey("ledger"), counting(&calls, vec![10u32, 20]));
    settled(&mut sub).await;
    drop(sub);

    let second = QueryClient::with_snapshots(QueryOptions::default(), storage);
    let sub: Subscription<Vec<u32>> = second.subscribe(&TestKey("ledger"), || {
      std::future::pending::<Result<Vec<u32>, PortalError>>()
    });
    let snapshot = sub.snapshot();
    assert!(snapshot.is_refreshing());
    assert!(snapshot.is_stale);
    assert_eq!(snapshot.data.as_deref(), Some(&vec![10, 20]));
  }

  #[tokio::test]
  async fn test_clear_forgets_entries() {
    let storage = Arc::new(MemoryStorage::default());
    let client = QueryClient::with_snapshots(QueryOptions::default(), storage.clone());
    let calls = counter();

    let mut sub = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    settled(&mut sub).await;

    client.clear();
    assert!(client.is_empty());
    assert!(sub.data().is_none());
    assert!(storage
      .load_snapshot(&TestKey("orders").cache_hash())
      .unwrap()
      .is_none());
  }

  fn retaining(eviction: EvictionPolicy) -> QueryClient {
    QueryClient::new(QueryOptions {
      eviction,
      ..QueryOptions::default()
    })
  }

  #[tokio::test]
  async fn test_unwatched_mutation_leaves_cold_entry() {
    for eviction in [EvictionPolicy::Ttl(Duration::from_secs(300)), EvictionPolicy::Never] {
      let client = retaining(eviction);
      let calls = counter();

      client
        .mutate(&TestKey("returns"), |_: Option<&Vec<u32>>| None, async { Ok(None) })
        .await
        .unwrap();
      assert_eq!(client.len(), 1);

      let mut sub = client.subscribe(&TestKey("returns"), counting(&calls, vec![1u32]));
      assert!(sub.snapshot().is_loading(), "{eviction:?}");
      let snapshot = settled(&mut sub).await;
      assert_eq!(snapshot.data.as_deref(), Some(&vec![1]));
      assert_eq!(calls.load(Ordering::SeqCst), 1, "{eviction:?}");
    }
  }

  #[tokio::test]
  async fn test_unwatched_optimistic_write_is_revalidated() {
    for eviction in [EvictionPolicy::Ttl(Duration::from_secs(300)), EvictionPolicy::Never] {
      let client = retaining(eviction);
      let calls = counter();

      client
        .mutate(
          &TestKey("returns"),
          |_: Option<&Vec<u32>>| Some(vec![0]),
          async { Ok(None) },
        )
        .await
        .unwrap();

      let mut sub = client.subscribe(&TestKey("returns"), counting(&calls, vec![0u32, 1]));
      let snapshot = sub.snapshot();
      assert!(snapshot.is_refreshing(), "{eviction:?}");
      assert_eq!(snapshot.data.as_deref(), Some(&vec![0]));

      let snapshot = settled(&mut sub).await;
      assert_eq!(snapshot.data.as_deref(), Some(&vec![0, 1]));
      assert_eq!(calls.load(Ordering::SeqCst), 1, "{eviction:?}");
    }
  }

  #[tokio::test]
  async fn test_unwatched_mutation_with_value_is_fresh() {
    let client = retaining(EvictionPolicy::Never);
    let calls = counter();

    client
      .mutate(&TestKey("returns"), |_: Option<&u32>| None, async { Ok(Some(4u32)) })
      .await
      .unwrap();

    let sub = client.subscribe(&TestKey("returns"), counting(&calls, 5u32));
    assert_eq!(sub.snapshot().state, EntryState::Resolved);
    assert_eq!(sub.data().as_deref(), Some(&4));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_subscription_from_before_clear_leaves_new_entry_alone() {
    let client = QueryClient::new(QueryOptions::default());
    let calls = counter();

    let mut old = client.subscribe(&TestKey("orders"), counting(&calls, 1u32));
    settled(&mut old).await;
    client.clear();

    let mut current = client.subscribe(&TestKey("orders"), counting(&calls, 2u32));
    settled(&mut current).await;

    drop(old);
    assert_eq!(client.len(), 1);
    assert_eq!(current.data().as_deref(), Some(&2));

    drop(current);
    assert!(client.is_empty());
  }
}
