//! Shared test doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{Notice, Notifier};
use crate::store::{Document, DocumentStore, MemoryStore, Record, SearchRequest, StoreError};

/// Wraps a [`MemoryStore`], counts attempted requests and can be switched
/// into a failing mode.
pub struct FlakyStore {
  inner: MemoryStore,
  attempts: AtomicUsize,
  failure: Mutex<Option<StoreError>>,
  read_delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
  pub fn new(inner: MemoryStore) -> Self {
    Self {
      inner,
      attempts: AtomicUsize::new(0),
      failure: Mutex::new(None),
      read_delay: Mutex::new(None),
    }
  }

  /// Every request fails with `err` until called again with `None`.
  pub fn fail_with(&self, err: Option<StoreError>) {
    *self.failure.lock().unwrap() = err;
  }

  /// Single-document reads answer `delay` after reading the stored value.
  pub fn slow_reads(&self, delay: Option<Duration>) {
    *self.read_delay.lock().unwrap() = delay;
  }

  /// Requests attempted, failed ones included.
  pub fn request_count(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }

  fn attempt(&self) -> Result<(), StoreError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    match self.failure.lock().unwrap().clone() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl DocumentStore for FlakyStore {
  async fn fetch_all(&self, collection: &str) -> Result<Vec<Document<Record>>, StoreError> {
    self.attempt()?;
    self.inner.fetch_all(collection).await
  }

  async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
    self.attempt()?;
    let read = self.inner.fetch_by_id(collection, id).await;
    let delay = *self.read_delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    read
  }

  async fn query(
    &self,
    collection: &str,
    request: &SearchRequest,
  ) -> Result<Vec<Document<Record>>, StoreError> {
    self.attempt()?;
    self.inner.query(collection, request).await
  }

  async fn create(&self, collection: &str, data: Record) -> Result<String, StoreError> {
    self.attempt()?;
    self.inner.create(collection, data).await
  }

  async fn merge(&self, collection: &str, id: &str, fields: Record) -> Result<(), StoreError> {
    self.attempt()?;
    self.inner.merge(collection, id, fields).await
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    self.attempt()?;
    self.inner.delete(collection, id).await
  }
}

/// Keeps every notice it receives.
#[derive(Default)]
pub struct RecordingNotifier {
  notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
  pub fn notices(&self) -> Vec<Notice> {
    self.notices.lock().unwrap().clone()
  }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, notice: Notice) {
    self.notices.lock().unwrap().push(notice);
  }
}
