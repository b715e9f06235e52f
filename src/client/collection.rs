//! Typed client over one named collection.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{CollectionError, Operation};
use super::notify::{Notice, Notifier};
use crate::cache::{CacheLayer, CacheSettings, QueryKey};
use crate::store::{filter, Criteria, Document, DocumentStore, Record, SearchOptions, SearchRequest, StoreError};

/// Result of a merge update: the id and the fields that were submitted.
///
/// This is not a re-fetched copy; call `get_by_id` for the stored state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Updated {
  pub id: String,
  pub fields: Record,
}

/// Uniform request/response surface over one remote collection.
///
/// Every call returns its own `Result`; store failures are also reported once
/// to the notifier. Clients for the same collection obtained from one
/// [`ClientRegistry`](super::ClientRegistry) share their cache.
pub struct CollectionClient<T> {
  name: Arc<str>,
  store: Arc<dyn DocumentStore>,
  cache: Arc<CacheLayer>,
  notifier: Arc<dyn Notifier>,
  _record: PhantomData<fn() -> T>,
}

impl<T> Clone for CollectionClient<T> {
  fn clone(&self) -> Self {
    Self {
      name: Arc::clone(&self.name),
      store: Arc::clone(&self.store),
      cache: Arc::clone(&self.cache),
      notifier: Arc::clone(&self.notifier),
      _record: PhantomData,
    }
  }
}

fn now_stamp() -> Value {
  Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn to_record<D: Serialize + ?Sized>(data: &D) -> Result<Record, CollectionError> {
  match serde_json::to_value(data) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(other) => Err(CollectionError::InvalidRecord(format!(
      "expected a JSON object, got {}",
      other
    ))),
    Err(e) => Err(CollectionError::InvalidRecord(e.to_string())),
  }
}

impl<T> CollectionClient<T>
where
  T: Serialize + DeserializeOwned,
{
  pub fn new(
    name: &str,
    store: Arc<dyn DocumentStore>,
    cache: Arc<CacheLayer>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    Self {
      name: Arc::from(name),
      store,
      cache,
      notifier,
      _record: PhantomData,
    }
  }

  /// A client with a private cache, not shared with any other client.
  pub fn standalone(name: &str, store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
    let cache = Arc::new(CacheLayer::new(&CacheSettings::default()));
    Self::new(name, store, cache, notifier)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Number of documents currently cached for this collection.
  pub fn cached_len(&self) -> usize {
    self.cache.len()
  }

  fn fail(&self, op: Operation, err: StoreError) -> CollectionError {
    warn!(collection = %self.name, ?op, code = ?err.code, error = %err.message, "store request failed");
    self.notifier.notify(Notice::failure(op));
    CollectionError::store(op, err)
  }

  fn decode(&self, doc: Document<Record>) -> Result<Document<T>, CollectionError> {
    let Document { id, data } = doc;
    let data = serde_json::from_value(Value::Object(data))
      .map_err(|e| CollectionError::InvalidRecord(format!("{}/{}: {}", self.name, id, e)))?;
    Ok(Document { id, data })
  }

  fn decode_all(&self, docs: Vec<Document<Record>>) -> Result<Vec<Document<T>>, CollectionError> {
    docs.into_iter().map(|doc| self.decode(doc)).collect()
  }

  async fn fetch_all_records(&self, op: Operation) -> Result<Vec<Document<Record>>, CollectionError> {
    let store = Arc::clone(&self.store);
    let name = Arc::clone(&self.name);
    self
      .cache
      .fetch_list(&QueryKey::all(&self.name), move || async move {
        store.fetch_all(&name).await
      })
      .await
      .map(|result| result.data)
      .map_err(|e| self.fail(op, e))
  }

  /// Every document in the collection, in store order.
  pub async fn get_all(&self) -> Result<Vec<Document<T>>, CollectionError> {
    debug!(collection = %self.name, "get all");
    let docs = self.fetch_all_records(Operation::FetchAll).await?;
    self.decode_all(docs)
  }

  /// One document, served from cache while fresh. Missing ids give `None`.
  pub async fn get_by_id(&self, id: &str) -> Result<Option<Document<T>>, CollectionError> {
    if id.trim().is_empty() {
      return Err(CollectionError::MissingId);
    }

    let store = Arc::clone(&self.store);
    let name = Arc::clone(&self.name);
    let key = id.to_string();
    let result = self
      .cache
      .fetch_one(id, move || async move { store.fetch_by_id(&name, &key).await })
      .await
      .map_err(|e| self.fail(Operation::FetchOne, e))?;

    result
      .data
      .map(|record| self.decode(Document::new(id, record)))
      .transpose()
  }

  /// Documents matching every criterion.
  ///
  /// Accepts a single `(field, value)` pair or any map of pairs. Empty
  /// criteria without options is the same call as [`get_all`](Self::get_all).
  pub async fn search(
    &self,
    criteria: impl Into<Criteria>,
    options: SearchOptions,
  ) -> Result<Vec<Document<T>>, CollectionError> {
    let request = SearchRequest::new(criteria.into(), options);
    if request.filters.is_empty() && request.options.is_default() {
      return self.get_all().await;
    }

    debug!(collection = %self.name, filters = request.filters.filters().len(), "search");
    let store = Arc::clone(&self.store);
    let name = Arc::clone(&self.name);
    let key = QueryKey::search(&self.name, &request);
    let docs = self
      .cache
      .fetch_list(&key, move || async move { store.query(&name, &request).await })
      .await
      .map_err(|e| self.fail(Operation::Search, e))?
      .data;

    self.decode_all(docs)
  }

  /// Case-insensitive substring search on one field.
  ///
  /// The store cannot index substrings, so this reads the whole collection
  /// and filters, orders and limits locally. Cost grows with the collection.
  pub async fn search_contains(
    &self,
    field: &str,
    needle: &str,
    options: SearchOptions,
  ) -> Result<Vec<Document<T>>, CollectionError> {
    debug!(collection = %self.name, field, "contains search");
    let docs = self.fetch_all_records(Operation::Search).await?;
    let matched: Vec<Document<Record>> = docs
      .into_iter()
      .filter(|doc| doc.data.get(field).is_some_and(|v| filter::contains(v, needle)))
      .collect();

    self.decode_all(filter::order_and_limit(matched, &options))
  }

  /// Insert a document, stamping `createdAt` when it is absent.
  pub async fn add(&self, data: &T) -> Result<Document<T>, CollectionError> {
    let mut record = to_record(data)?;
    if record.get("createdAt").map_or(true, Value::is_null) {
      record.insert("createdAt".to_string(), now_stamp());
    }

    let id = self
      .store
      .create(&self.name, record.clone())
      .await
      .map_err(|e| self.fail(Operation::Add, e))?;
    self.cache.invalidate_queries();

    debug!(collection = %self.name, id = %id, "added");
    self.decode(Document::new(id, record))
  }

  /// Merge `patch` into a document, stamping `updatedAt`.
  ///
  /// Fields absent from `patch` are left untouched at the store.
  pub async fn update<P: Serialize + ?Sized>(
    &self,
    id: &str,
    patch: &P,
  ) -> Result<Updated, CollectionError> {
    if id.trim().is_empty() {
      return Err(CollectionError::MissingId);
    }

    let mut fields = to_record(patch)?;
    fields.insert("updatedAt".to_string(), now_stamp());

    self
      .store
      .merge(&self.name, id, fields.clone())
      .await
      .map_err(|e| self.fail(Operation::Update, e))?;
    self.cache.invalidate(id);

    debug!(collection = %self.name, id, "updated");
    Ok(Updated {
      id: id.to_string(),
      fields,
    })
  }

  /// Hard-delete a document. Removing a missing id succeeds.
  pub async fn remove(&self, id: &str) -> Result<String, CollectionError> {
    if id.trim().is_empty() {
      return Err(CollectionError::MissingId);
    }

    self
      .store
      .delete(&self.name, id)
      .await
      .map_err(|e| self.fail(Operation::Remove, e))?;
    self.cache.invalidate(id);

    debug!(collection = %self.name, id, "removed");
    Ok(id.to_string())
  }

  /// Drop every cached entry for this collection.
  pub fn clear_cache(&self) {
    self.cache.clear();
  }
}
