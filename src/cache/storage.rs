//! Cache storage trait and its in-memory implementation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::entry::{CacheEntry, CachedQuery};

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get a cached document by id.
  fn get_entry(&self, key: &str) -> Option<CacheEntry>;

  /// Store (or overwrite) a document entry.
  fn put_entry(&self, entry: CacheEntry);

  /// Drop a single document entry.
  fn remove_entry(&self, key: &str);

  /// Get a cached list result by query hash.
  fn get_query(&self, hash: &str) -> Option<CachedQuery>;

  /// Store a list result under a query hash.
  fn put_query(&self, hash: &str, result: CachedQuery);

  /// Drop every cached list result.
  fn clear_queries(&self);

  /// Drop everything.
  fn clear(&self);

  /// Number of cached documents.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when the TTL is zero - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get_entry(&self, _key: &str) -> Option<CacheEntry> {
    None
  }

  fn put_entry(&self, _entry: CacheEntry) {}

  fn remove_entry(&self, _key: &str) {}

  fn get_query(&self, _hash: &str) -> Option<CachedQuery> {
    None
  }

  fn put_query(&self, _hash: &str, _result: CachedQuery) {}

  fn clear_queries(&self) {}

  fn clear(&self) {}

  fn len(&self) -> usize {
    0
  }
}

#[derive(Default)]
struct Tables {
  entries: HashMap<String, CacheEntry>,
  queries: HashMap<String, CachedQuery>,
}

/// Process-local cache storage.
#[derive(Default)]
pub struct MemoryStorage {
  tables: Mutex<Tables>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  // A panic while holding the lock leaves plain maps behind, still usable.
  fn tables(&self) -> MutexGuard<'_, Tables> {
    self.tables.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl CacheStorage for MemoryStorage {
  fn get_entry(&self, key: &str) -> Option<CacheEntry> {
    self.tables().entries.get(key).cloned()
  }

  fn put_entry(&self, entry: CacheEntry) {
    self.tables().entries.insert(entry.key.clone(), entry);
  }

  fn remove_entry(&self, key: &str) {
    self.tables().entries.remove(key);
  }

  fn get_query(&self, hash: &str) -> Option<CachedQuery> {
    self.tables().queries.get(hash).cloned()
  }

  fn put_query(&self, hash: &str, result: CachedQuery) {
    self.tables().queries.insert(hash.to_string(), result);
  }

  fn clear_queries(&self) {
    self.tables().queries.clear();
  }

  fn clear(&self) {
    let mut tables = self.tables();
    tables.entries.clear();
    tables.queries.clear();
  }

  fn len(&self) -> usize {
    self.tables().entries.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::Record;
  use chrono::Utc;

  #[test]
  fn test_entry_overwrite() {
    let storage = MemoryStorage::new();
    let mut first = Record::new();
    first.insert("v".into(), 1.into());
    let mut second = Record::new();
    second.insert("v".into(), 2.into());

    storage.put_entry(CacheEntry::new("e1", first));
    storage.put_entry(CacheEntry::new("e1", second));

    assert_eq!(storage.len(), 1);
    assert_eq!(storage.get_entry("e1").unwrap().data["v"], 2);
  }

  #[test]
  fn test_clear_drops_entries_and_queries() {
    let storage = MemoryStorage::new();
    storage.put_entry(CacheEntry::new("e1", Record::new()));
    storage.put_query(
      "q",
      CachedQuery {
        docs: Vec::new(),
        fetched_at: Utc::now(),
      },
    );

    storage.clear_queries();
    assert!(storage.get_query("q").is_none());
    assert!(storage.get_entry("e1").is_some());

    storage.clear();
    assert!(storage.is_empty());
  }

  #[test]
  fn test_noop_never_hits() {
    let storage = NoopStorage;
    storage.put_entry(CacheEntry::new("e1", Record::new()));
    assert!(storage.get_entry("e1").is_none());
    assert!(storage.is_empty());
  }
}
