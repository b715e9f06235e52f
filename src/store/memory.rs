//! In-process document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::filter;
use super::query::SearchRequest;
use super::{new_document_id, Document, DocumentStore, Record, StoreError};

/// Collections held in memory, each keeping insertion order.
///
/// Every request bumps a counter so callers can assert how many round trips
/// a piece of code actually made.
#[derive(Default)]
pub struct MemoryStore {
  collections: RwLock<HashMap<String, Vec<Document<Record>>>>,
  requests: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of requests served so far.
  pub fn request_count(&self) -> usize {
    self.requests.load(Ordering::SeqCst)
  }

  fn count(&self) {
    self.requests.fetch_add(1, Ordering::SeqCst);
  }
}

#[async_trait]
impl DocumentStore for MemoryStore {
  async fn fetch_all(&self, collection: &str) -> Result<Vec<Document<Record>>, StoreError> {
    self.count();
    let guard = self.collections.read().await;
    Ok(guard.get(collection).cloned().unwrap_or_default())
  }

  async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
    self.count();
    let guard = self.collections.read().await;
    Ok(
      guard
        .get(collection)
        .and_then(|docs| docs.iter().find(|d| d.id == id))
        .map(|d| d.data.clone()),
    )
  }

  async fn query(
    &self,
    collection: &str,
    request: &SearchRequest,
  ) -> Result<Vec<Document<Record>>, StoreError> {
    self.count();
    let guard = self.collections.read().await;
    let docs = guard.get(collection).cloned().unwrap_or_default();
    Ok(filter::apply(docs, request))
  }

  async fn create(&self, collection: &str, data: Record) -> Result<String, StoreError> {
    self.count();
    let id = new_document_id(collection);
    let mut guard = self.collections.write().await;
    guard
      .entry(collection.to_string())
      .or_default()
      .push(Document::new(id.clone(), data));
    Ok(id)
  }

  async fn merge(&self, collection: &str, id: &str, fields: Record) -> Result<(), StoreError> {
    self.count();
    let mut guard = self.collections.write().await;
    let doc = guard
      .get_mut(collection)
      .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
      .ok_or_else(|| StoreError::not_found(collection, id))?;
    doc.data.extend(fields);
    Ok(())
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    self.count();
    let mut guard = self.collections.write().await;
    if let Some(docs) = guard.get_mut(collection) {
      docs.retain(|d| d.id != id);
    }
    Ok(())
  }
}
