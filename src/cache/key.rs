//! Query keys for cached list results.

use sha2::{Digest, Sha256};

use crate::store::SearchRequest;

/// Identifies a list read against one collection.
#[derive(Clone, Debug)]
pub enum QueryKey {
  /// Every document of a collection
  All { collection: String },
  /// Equality search with options
  Search {
    collection: String,
    request: SearchRequest,
  },
}

impl QueryKey {
  pub fn all(collection: &str) -> Self {
    Self::All {
      collection: collection.to_string(),
    }
  }

  pub fn search(collection: &str, request: &SearchRequest) -> Self {
    Self::Search {
      collection: collection.to_string(),
      request: request.clone(),
    }
  }

  /// Stable, fixed-length hash; filter order does not matter.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      Self::All { collection } => format!("all:{}", collection),
      Self::Search {
        collection,
        request,
      } => {
        let filters: Vec<String> = request
          .filters
          .normalized()
          .into_iter()
          .map(|f| format!("{}={}", f.field, f.value))
          .collect();
        let order = request
          .options
          .order_by
          .as_ref()
          .map(|o| format!("{}:{:?}", o.field, o.direction))
          .unwrap_or_default();
        let limit = request
          .options
          .limit
          .map(|l| l.to_string())
          .unwrap_or_default();
        format!(
          "search:{}:{}:{}:{}",
          collection,
          filters.join("&"),
          order,
          limit
        )
      }
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    match self {
      Self::All { collection } => format!("all {}", collection),
      Self::Search {
        collection,
        request,
      } => format!(
        "{} where {} filter(s)",
        collection,
        request.filters.filters().len()
      ),
    }
  }
}
