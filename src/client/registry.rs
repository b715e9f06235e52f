//! One shared cache per collection name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::collection::CollectionClient;
use super::notify::Notifier;
use super::Collection;
use crate::cache::{CacheLayer, CacheSettings};
use crate::store::DocumentStore;

/// Hands out collection clients that share a cache per collection name.
///
/// The registry only holds weak references: a collection's cache lives as
/// long as at least one client for it does, and the next client after that
/// starts from an empty cache.
pub struct ClientRegistry {
  store: Arc<dyn DocumentStore>,
  notifier: Arc<dyn Notifier>,
  settings: CacheSettings,
  caches: Mutex<HashMap<String, Weak<CacheLayer>>>,
}

impl ClientRegistry {
  pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      store,
      notifier,
      settings: CacheSettings::default(),
      caches: Mutex::new(HashMap::new()),
    }
  }

  /// Cache settings applied to caches created from now on.
  pub fn with_settings(mut self, settings: CacheSettings) -> Self {
    self.settings = settings;
    self
  }

  /// Client for a typed collection.
  pub fn client<T: Collection>(&self) -> CollectionClient<T> {
    self.collection(T::NAME)
  }

  /// Client for any collection name.
  pub fn collection<T>(&self, name: &str) -> CollectionClient<T>
  where
    T: Serialize + DeserializeOwned,
  {
    CollectionClient::new(
      name,
      Arc::clone(&self.store),
      self.cache_for(name),
      Arc::clone(&self.notifier),
    )
  }

  fn cache_for(&self, name: &str) -> Arc<CacheLayer> {
    let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(cache) = caches.get(name).and_then(Weak::upgrade) {
      return cache;
    }

    caches.retain(|_, cache| cache.strong_count() > 0);
    debug!(collection = name, "creating collection cache");
    let cache = Arc::new(CacheLayer::new(&self.settings));
    caches.insert(name.to_string(), Arc::downgrade(&cache));
    cache
  }

  /// Number of collection caches currently alive.
  pub fn live_caches(&self) -> usize {
    let caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
    caches.values().filter(|c| c.strong_count() > 0).count()
  }
}
