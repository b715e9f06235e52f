//! Cache layer that orchestrates caching logic with store fetching.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheResult, CachedQuery};
use super::key::QueryKey;
use super::storage::{CacheStorage, MemoryStorage, NoopStorage};
use crate::store::{Document, Record, StoreError};

/// Default freshness window for cached documents.
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(10);

type SharedFetch = Shared<BoxFuture<'static, Result<Option<Record>, StoreError>>>;

/// Tuning for a [`CacheLayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
  /// When false nothing is ever cached.
  pub enabled: bool,
  pub ttl: std::time::Duration,
  /// Also cache `get_all`/`search` results for the TTL.
  pub cache_queries: bool,
  /// Serve an expired entry instead of failing when the store errors.
  pub serve_stale_on_error: bool,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl: DEFAULT_TTL,
      cache_queries: false,
      serve_stale_on_error: false,
    }
  }
}

/// Per-collection cache sitting between the collection client and the store.
///
/// - document entries are served while younger than the TTL
/// - concurrent misses for one id share a single store request
/// - writes invalidate through [`CacheLayer::invalidate`]; a fetch that was
///   already in flight when an invalidation happened does not repopulate
///   the cache
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  ttl: Duration,
  cache_queries: bool,
  serve_stale_on_error: bool,
  inflight: Mutex<HashMap<String, SharedFetch>>,
  epoch: AtomicU64,
}

impl CacheLayer {
  pub fn new(settings: &CacheSettings) -> Self {
    let storage: Arc<dyn CacheStorage> = if settings.enabled {
      Arc::new(MemoryStorage::new())
    } else {
      Arc::new(NoopStorage)
    };

    Self {
      storage,
      ttl: Duration::from_std(settings.ttl).unwrap_or_else(|_| Duration::weeks(5200)),
      cache_queries: settings.enabled && settings.cache_queries,
      serve_stale_on_error: settings.serve_stale_on_error,
      inflight: Mutex::new(HashMap::new()),
      epoch: AtomicU64::new(0),
    }
  }

  /// Set the freshness window.
  pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
    self.ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::weeks(5200));
    self
  }

  fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
    Utc::now() - fetched_at < self.ttl
  }

  fn inflight(&self) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
    self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Join a pending fetch for `key` or start a new one.
  fn join_or_start<F, Fut>(&self, key: &str, fetcher: F) -> SharedFetch
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<Record>, StoreError>> + Send + 'static,
  {
    let mut inflight = self.inflight();
    if let Some(pending) = inflight.get(key) {
      // A completed future left behind by a cancelled caller is not "in flight".
      if pending.peek().is_none() {
        debug!(key, "joining in-flight fetch");
        return pending.clone();
      }
    }

    let fetch = fetcher().boxed().shared();
    inflight.insert(key.to_string(), fetch.clone());
    fetch
  }

  fn finish(&self, key: &str) {
    let mut inflight = self.inflight();
    if inflight.get(key).is_some_and(|f| f.peek().is_some()) {
      inflight.remove(key);
    }
  }

  /// Fetch a single document with caching.
  ///
  /// 1. Fresh entry: return it, no store call
  /// 2. Otherwise fetch (joining an identical in-flight fetch if any)
  /// 3. Found: overwrite the entry; not found: drop it
  /// 4. Store failure: serve the expired entry only when offline fallback
  ///    is enabled, else fail
  pub async fn fetch_one<F, Fut>(
    &self,
    key: &str,
    fetcher: F,
  ) -> Result<CacheResult<Option<Record>>, StoreError>
  where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<Option<Record>, StoreError>> + Send + 'static,
  {
    let stale = match self.storage.get_entry(key) {
      Some(entry) if self.is_fresh(entry.fetched_at) => {
        debug!(key, "cache hit");
        return Ok(CacheResult::from_cache(Some(entry.data), entry.fetched_at));
      }
      other => other,
    };

    debug!(key, expired = stale.is_some(), "cache miss");
    let epoch = self.epoch.load(Ordering::SeqCst);
    let fetch = self.join_or_start(key, fetcher);
    let outcome = fetch.await;
    self.finish(key);

    match outcome {
      Ok(Some(record)) => {
        if self.epoch.load(Ordering::SeqCst) == epoch {
          self.storage.put_entry(CacheEntry::new(key, record.clone()));
        }
        Ok(CacheResult::from_network(Some(record)))
      }
      Ok(None) => {
        self.storage.remove_entry(key);
        Ok(CacheResult::from_network(None))
      }
      Err(err) => match stale {
        Some(entry) if self.serve_stale_on_error => {
          warn!(key, error = %err, "store failed, serving expired entry");
          Ok(CacheResult::offline(Some(entry.data), entry.fetched_at))
        }
        _ => Err(err),
      },
    }
  }

  /// Fetch a list result, caching it only when query caching is enabled.
  pub async fn fetch_list<F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<Vec<Document<Record>>>, StoreError>
  where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<Vec<Document<Record>>, StoreError>> + Send,
  {
    if !self.cache_queries {
      return fetcher().await.map(CacheResult::from_network);
    }

    let hash = key.cache_hash();
    let stale = match self.storage.get_query(&hash) {
      Some(cached) if self.is_fresh(cached.fetched_at) => {
        debug!(query = %key.description(), "query cache hit");
        return Ok(CacheResult::from_cache(cached.docs, cached.fetched_at));
      }
      other => other,
    };

    let epoch = self.epoch.load(Ordering::SeqCst);
    match fetcher().await {
      Ok(docs) => {
        if self.epoch.load(Ordering::SeqCst) == epoch {
          self.storage.put_query(
            &hash,
            CachedQuery {
              docs: docs.clone(),
              fetched_at: Utc::now(),
            },
          );
        }
        Ok(CacheResult::from_network(docs))
      }
      Err(err) => match stale {
        Some(cached) if self.serve_stale_on_error => {
          warn!(query = %key.description(), error = %err, "store failed, serving expired result");
          Ok(CacheResult::offline(cached.docs, cached.fetched_at))
        }
        _ => Err(err),
      },
    }
  }

  /// Drop one document entry and every cached list result.
  pub fn invalidate(&self, key: &str) {
    self.epoch.fetch_add(1, Ordering::SeqCst);
    self.storage.remove_entry(key);
    self.storage.clear_queries();
    self.inflight().remove(key);
  }

  /// Drop every cached list result.
  pub fn invalidate_queries(&self) {
    self.epoch.fetch_add(1, Ordering::SeqCst);
    self.storage.clear_queries();
  }

  /// Drop everything.
  pub fn clear(&self) {
    self.epoch.fetch_add(1, Ordering::SeqCst);
    self.storage.clear();
    self.inflight().clear();
  }

  /// Number of cached documents.
  pub fn len(&self) -> usize {
    self.storage.len()
  }

  pub fn is_empty(&self) -> bool {
    self.storage.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  fn record(v: i64) -> Record {
    let mut r = Record::new();
    r.insert("v".into(), v.into());
    r
  }

  fn counting_fetch(
    calls: &Arc<AtomicUsize>,
    v: i64,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<Option<Record>, StoreError>> + Send {
    let calls = Arc::clone(calls);
    move || {
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(Some(record(v)))
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_entry_skips_fetch() {
    let cache = CacheLayer::new(&CacheSettings::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();
    let second = cache.fetch_one("e1", counting_fetch(&calls, 2)).await.unwrap();

    assert_eq!(first.source, crate::cache::CacheSource::Network);
    assert_eq!(second.source, crate::cache::CacheSource::CacheFresh);
    assert_eq!(second.data.unwrap()["v"], 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_refetches() {
    let cache = CacheLayer::new(&CacheSettings::default()).with_ttl(std::time::Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));

    cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();
    let second = cache.fetch_one("e1", counting_fetch(&calls, 2)).await.unwrap();

    assert_eq!(second.data.unwrap()["v"], 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_concurrent_misses_share_one_fetch() {
    let cache = CacheLayer::new(&CacheSettings::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
      cache.fetch_one("e1", counting_fetch(&calls, 1)),
      cache.fetch_one("e1", counting_fetch(&calls, 2)),
    );

    assert_eq!(a.unwrap().data, b.unwrap().data);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_not_found_is_not_cached() {
    let cache = CacheLayer::new(&CacheSettings::default());
    let result = cache
      .fetch_one("ghost", || async { Ok(None) })
      .await
      .unwrap();
    assert!(result.data.is_none());
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let cache = CacheLayer::new(&CacheSettings::default());
    let calls = Arc::new(AtomicUsize::new(0));

    cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();
    cache.invalidate("e1");
    let again = cache.fetch_one("e1", counting_fetch(&calls, 2)).await.unwrap();

    assert_eq!(again.data.unwrap()["v"], 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_during_fetch_discards_result() {
    let cache = CacheLayer::new(&CacheSettings::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let (first, ()) = tokio::join!(cache.fetch_one("e1", counting_fetch(&calls, 1)), async {
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
      cache.invalidate("e1");
    });

    // the caller that started the fetch still gets its answer
    assert_eq!(first.unwrap().data.unwrap()["v"], 1);
    assert!(cache.is_empty());

    let again = cache.fetch_one("e1", counting_fetch(&calls, 2)).await.unwrap();
    assert_eq!(again.source, crate::cache::CacheSource::Network);
    assert_eq!(again.data.unwrap()["v"], 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failure_without_fallback_propagates() {
    let cache = CacheLayer::new(&CacheSettings::default()).with_ttl(std::time::Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));
    cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();

    let err = cache
      .fetch_one("e1", || async { Err(StoreError::unavailable("offline")) })
      .await
      .unwrap_err();
    assert_eq!(err.code.as_deref(), Some("unavailable"));
  }

  #[tokio::test]
  async fn test_offline_fallback_serves_expired_entry() {
    let settings = CacheSettings {
      serve_stale_on_error: true,
      ..CacheSettings::default()
    };
    let cache = CacheLayer::new(&settings).with_ttl(std::time::Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));
    cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();

    let result = cache
      .fetch_one("e1", || async { Err(StoreError::unavailable("offline")) })
      .await
      .unwrap();
    assert_eq!(result.source, crate::cache::CacheSource::Offline);
    assert_eq!(result.data.unwrap()["v"], 1);
  }

  #[tokio::test]
  async fn test_list_results_cached_only_when_enabled() {
    let key = QueryKey::all("badges");
    let calls = Arc::new(AtomicUsize::new(0));
    let list = |calls: &Arc<AtomicUsize>| {
      let calls = Arc::clone(calls);
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Document::new("b1", record(1))])
      }
    };

    let plain = CacheLayer::new(&CacheSettings::default());
    plain.fetch_list(&key, list(&calls)).await.unwrap();
    plain.fetch_list(&key, list(&calls)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let settings = CacheSettings {
      cache_queries: true,
      ..CacheSettings::default()
    };
    let caching = CacheLayer::new(&settings);
    caching.fetch_list(&key, list(&calls)).await.unwrap();
    let hit = caching.fetch_list(&key, list(&calls)).await.unwrap();
    assert_eq!(hit.source, crate::cache::CacheSource::CacheFresh);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    caching.invalidate_queries();
    caching.fetch_list(&key, list(&calls)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn test_disabled_cache_always_fetches() {
    let settings = CacheSettings {
      enabled: false,
      ..CacheSettings::default()
    };
    let cache = CacheLayer::new(&settings);
    let calls = Arc::new(AtomicUsize::new(0));
    cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();
    cache.fetch_one("e1", counting_fetch(&calls, 1)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
