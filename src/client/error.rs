use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Which client operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  FetchAll,
  FetchOne,
  Search,
  Add,
  Update,
  Remove,
}

impl Operation {
  /// Fixed user-facing description for failure notices.
  pub fn failure_description(self) -> &'static str {
    match self {
      Operation::FetchAll => "Failed to fetch data",
      Operation::FetchOne => "Failed to fetch document",
      Operation::Search => "Failed to search documents",
      Operation::Add => "Failed to add document",
      Operation::Update => "Failed to update document",
      Operation::Remove => "Failed to delete document",
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.failure_description())
  }
}

/// Human text for a document-store error code.
pub fn describe_code(code: &str) -> Option<&'static str> {
  match code {
    "permission-denied" => Some("You do not have permission to perform this operation"),
    "unauthenticated" => Some("You must be signed in to perform this operation"),
    "not-found" => Some("The requested document does not exist"),
    "unavailable" => Some("The service is currently unavailable"),
    "deadline-exceeded" => Some("The request took too long to complete"),
    "already-exists" => Some("The document already exists"),
    "invalid-argument" => Some("The request was rejected as invalid"),
    "resource-exhausted" => Some("Too many requests, try again later"),
    "data-loss" => Some("The stored data could not be read"),
    _ => None,
  }
}

/// Failure of a collection client call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
  /// Caller passed an empty id; the store was not contacted.
  #[error("Document ID is required")]
  MissingId,

  /// A record could not be converted to or from a JSON object.
  #[error("Invalid record: {0}")]
  InvalidRecord(String),

  #[error("{op}: {}", describe(.code, .message))]
  Store {
    op: Operation,
    code: Option<String>,
    message: String,
  },
}

fn describe(code: &Option<String>, message: &str) -> String {
  match code.as_deref() {
    Some(code) => match describe_code(code) {
      Some(text) => format!("{} ({})", text, code),
      None => format!("{} ({})", message, code),
    },
    None => message.to_string(),
  }
}

impl CollectionError {
  pub fn store(op: Operation, err: StoreError) -> Self {
    Self::Store {
      op,
      code: err.code,
      message: err.message,
    }
  }

  /// The store error code, when the failure came from the store.
  pub fn code(&self) -> Option<&str> {
    match self {
      Self::Store { code, .. } => code.as_deref(),
      _ => None,
    }
  }
}
