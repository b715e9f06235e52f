//! Cache entries and result metadata.

use chrono::{DateTime, Utc};

use crate::store::{Document, Record};

/// One cached document.
///
/// Created on the first successful fetch of `key`, overwritten by every later
/// fetch, and dropped on invalidation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub key: String,
  pub data: Record,
  pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(key: impl Into<String>, data: Record) -> Self {
    Self {
      key: key.into(),
      data,
      fetched_at: Utc::now(),
    }
  }
}

/// A cached list result (`get_all` or `search`).
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
  pub docs: Vec<Document<Record>>,
  pub fetched_at: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Expired data served because the store could not be reached.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the store
  Network,
  /// Data from cache, still inside the TTL
  CacheFresh,
  /// Store failed, serving an expired entry
  Offline,
}
