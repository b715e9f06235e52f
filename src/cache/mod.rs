//! Short-lived read cache for collection clients.
//!
//! This module provides a store-agnostic caching mechanism that:
//! - Caches documents by id with a fixed TTL (10 seconds by default)
//! - De-duplicates concurrent fetches of the same id
//! - Optionally caches list results under a hashed query key
//! - Optionally serves expired entries when the store is unreachable

mod entry;
mod key;
mod layer;
mod storage;

pub use entry::{CacheEntry, CacheResult, CacheSource, CachedQuery};
pub use key::QueryKey;
pub use layer::{CacheLayer, CacheSettings, DEFAULT_TTL};
pub use storage::{CacheStorage, MemoryStorage, NoopStorage};
