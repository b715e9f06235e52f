//! Search criteria and options shared by the client and the store drivers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Equality filters combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(Vec<Filter>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
  pub field: String,
  pub value: Value,
}

impl Criteria {
  /// No filters: matches every document.
  pub fn new() -> Self {
    Self::default()
  }

  /// A single `field == value` filter.
  pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::new().and(name, value)
  }

  /// Add another filter.
  pub fn and(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.0.push(Filter {
      field: name.into(),
      value: value.into(),
    });
    self
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn filters(&self) -> &[Filter] {
    &self.0
  }

  /// Filters sorted by field, for order-independent cache keys.
  pub fn normalized(&self) -> Vec<&Filter> {
    let mut filters: Vec<&Filter> = self.0.iter().collect();
    filters.sort_by(|a, b| a.field.cmp(&b.field));
    filters
  }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for Criteria {
  fn from((name, value): (K, V)) -> Self {
    Criteria::field(name, value)
  }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Criteria {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    iter
      .into_iter()
      .fold(Criteria::new(), |criteria, (k, v)| criteria.and(k, v))
  }
}

impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for Criteria {
  fn from(map: HashMap<K, V>) -> Self {
    map.into_iter().collect()
  }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Criteria {
  fn from(map: BTreeMap<K, V>) -> Self {
    map.into_iter().collect()
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
  pub field: String,
  pub direction: Direction,
}

/// Optional ordering and limit for a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_by: Option<OrderBy>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<usize>,
}

impl SearchOptions {
  pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
    self.order_by = Some(OrderBy {
      field: field.into(),
      direction,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn is_default(&self) -> bool {
    self.order_by.is_none() && self.limit.is_none()
  }
}

/// What a store receives for a `query` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
  pub filters: Criteria,
  #[serde(flatten)]
  pub options: SearchOptions,
}

impl SearchRequest {
  pub fn new(filters: Criteria, options: SearchOptions) -> Self {
    Self { filters, options }
  }
}
