//! Document store port and the drivers that implement it.
//!
//! The collection client never talks to a backend directly. It issues the
//! four primitive request shapes of [`DocumentStore`] (fetch-all, fetch-by-id,
//! query, create/merge/delete) and every backend answers them the same way:
//! - records are JSON objects keyed by a store-assigned string id
//! - `merge` on a missing document fails with `not-found`
//! - `delete` on a missing document succeeds

pub mod filter;
pub mod memory;
pub mod query;
pub mod rest;
pub mod sqlite;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use memory::MemoryStore;
pub use query::{Criteria, Direction, OrderBy, SearchOptions, SearchRequest};
pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// A raw document body as stored remotely.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A document together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
  pub id: String,
  #[serde(flatten)]
  pub data: T,
}

impl<T> Document<T> {
  pub fn new(id: impl Into<String>, data: T) -> Self {
    Self {
      id: id.into(),
      data,
    }
  }
}

/// Failure reported by a store driver.
///
/// `code` follows the document-store convention (`not-found`,
/// `permission-denied`, `unavailable`, ...) when the backend exposes one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
  pub code: Option<String>,
  pub message: String,
}

impl StoreError {
  pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      code: Some(code.into()),
      message: message.into(),
    }
  }

  /// An error the backend did not classify.
  pub fn uncoded(message: impl Into<String>) -> Self {
    Self {
      code: None,
      message: message.into(),
    }
  }

  pub fn not_found(collection: &str, id: &str) -> Self {
    Self::new("not-found", format!("No document {} in {}", id, collection))
  }

  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::new("unavailable", message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new("internal", message)
  }

  pub fn is_not_found(&self) -> bool {
    self.code.as_deref() == Some("not-found")
  }
}

/// The remote document store as seen by the collection client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  /// Every document of a collection, in store order.
  async fn fetch_all(&self, collection: &str) -> Result<Vec<Document<Record>>, StoreError>;

  /// One document, `None` when it does not exist.
  async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

  /// Equality query (all filters ANDed) with optional ordering and limit.
  async fn query(
    &self,
    collection: &str,
    request: &SearchRequest,
  ) -> Result<Vec<Document<Record>>, StoreError>;

  /// Insert a document and return its new id.
  async fn create(&self, collection: &str, data: Record) -> Result<String, StoreError>;

  /// Merge `fields` into an existing document.
  async fn merge(&self, collection: &str, id: &str, fields: Record) -> Result<(), StoreError>;

  /// Hard-delete a document.
  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a 20 character document id for the local backends.
pub fn new_document_id(collection: &str) -> String {
  let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
  let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);

  let mut hasher = Sha256::new();
  hasher.update(collection.as_bytes());
  hasher.update(nanos.to_le_bytes());
  hasher.update(seq.to_le_bytes());
  let digest = hasher.finalize();
  hex::encode(&digest[..10])
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn test_document_ids_are_unique_and_fixed_width() {
    let ids: HashSet<String> = (0..500).map(|_| new_document_id("badges")).collect();
    assert_eq!(ids.len(), 500);
    assert!(ids.iter().all(|id| id.len() == 20));
  }

  #[test]
  fn test_document_flattens_data() {
    let mut data = Record::new();
    data.insert("status".into(), "active".into());
    let doc = Document::new("b1", data);

    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json, serde_json::json!({ "id": "b1", "status": "active" }));
  }

  #[test]
  fn test_store_error_not_found() {
    let err = StoreError::not_found("employees", "e1");
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "No document e1 in employees");
    assert!(!StoreError::uncoded("boom").is_not_found());
  }
}
