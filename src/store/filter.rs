//! Client-side evaluation of search requests.
//!
//! Used by the local backends for `query` and by the client for
//! `search_contains`, so both agree on equality and ordering:
//! - numbers compare numerically (`1 == 1.0`)
//! - a missing field orders like `null`
//! - `null < bool < number < string < array < object`
//! - ties keep store order

use std::cmp::Ordering;

use serde_json::Value;

use super::query::{Criteria, Direction, SearchOptions, SearchRequest};
use super::{Document, Record};

/// JSON equality with numeric normalization.
pub fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
      (Some(x), Some(y)) => x == y,
      _ => x == y,
    },
    _ => a == b,
  }
}

/// True when every filter matches the record.
pub fn matches(criteria: &Criteria, record: &Record) -> bool {
  criteria.filters().iter().all(|filter| {
    record
      .get(&filter.field)
      .is_some_and(|value| values_equal(value, &filter.value))
  })
}

fn rank(value: &Value) -> u8 {
  match value {
    Value::Null => 0,
    Value::Bool(_) => 1,
    Value::Number(_) => 2,
    Value::String(_) => 3,
    Value::Array(_) => 4,
    Value::Object(_) => 5,
  }
}

/// Total order over optional JSON values.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  let a = a.unwrap_or(&Value::Null);
  let b = b.unwrap_or(&Value::Null);

  match (a, b) {
    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
    (Value::Number(x), Value::Number(y)) => {
      let x = x.as_f64().unwrap_or(f64::NAN);
      let y = y.as_f64().unwrap_or(f64::NAN);
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Value::String(x), Value::String(y)) => x.cmp(y),
    (Value::Array(x), Value::Array(y)) => x
      .iter()
      .zip(y.iter())
      .map(|(x, y)| compare_values(Some(x), Some(y)))
      .find(|o| o.is_ne())
      .unwrap_or_else(|| x.len().cmp(&y.len())),
    (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
    _ => rank(a).cmp(&rank(b)),
  }
}

/// Apply ordering and limit to already-filtered documents.
pub fn order_and_limit(mut docs: Vec<Document<Record>>, options: &SearchOptions) -> Vec<Document<Record>> {
  if let Some(order) = &options.order_by {
    docs.sort_by(|a, b| {
      let ord = compare_values(a.data.get(&order.field), b.data.get(&order.field));
      match order.direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
      }
    });
  }

  if let Some(limit) = options.limit {
    docs.truncate(limit);
  }

  docs
}

/// Evaluate a full search request over a collection snapshot.
pub fn apply(docs: Vec<Document<Record>>, request: &SearchRequest) -> Vec<Document<Record>> {
  let filtered = docs
    .into_iter()
    .filter(|doc| matches(&request.filters, &doc.data))
    .collect();
  order_and_limit(filtered, &request.options)
}

/// Case-insensitive substring test used by contains-search.
///
/// Strings are matched on their text; any other value on its JSON form.
pub fn contains(value: &Value, needle: &str) -> bool {
  let needle = needle.to_lowercase();
  match value {
    Value::String(s) => s.to_lowercase().contains(&needle),
    Value::Null => false,
    other => other.to_string().to_lowercase().contains(&needle),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::query::Criteria;
  use serde_json::json;

  fn doc(id: &str, value: Value) -> Document<Record> {
    match value {
      Value::Object(map) => Document::new(id, map),
      _ => panic!("fixture must be an object"),
    }
  }

  #[test]
  fn test_numbers_compare_numerically() {
    assert!(values_equal(&json!(1), &json!(1.0)));
    assert!(!values_equal(&json!(1), &json!("1")));
  }

  #[test]
  fn test_matches_requires_all_filters() {
    let record = doc("e1", json!({ "status": "active", "department": "it" })).data;
    assert!(matches(&Criteria::field("status", "active"), &record));
    assert!(matches(
      &Criteria::field("status", "active").and("department", "it"),
      &record
    ));
    assert!(!matches(
      &Criteria::field("status", "active").and("department", "hr"),
      &record
    ));
    assert!(!matches(&Criteria::field("missing", Value::Null), &record));
    assert!(matches(&Criteria::new(), &record));
  }

  #[test]
  fn test_missing_field_sorts_first() {
    assert_eq!(
      compare_values(None, Some(&json!("2026-01-01"))),
      Ordering::Less
    );
    assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
    assert_eq!(
      compare_values(Some(&json!("b")), Some(&json!(1))),
      Ordering::Greater
    );
  }

  #[test]
  fn test_apply_orders_and_limits() {
    let docs = vec![
      doc("a", json!({ "status": "active", "rank": 2 })),
      doc("b", json!({ "status": "pending", "rank": 1 })),
      doc("c", json!({ "status": "active", "rank": 3 })),
    ];
    let request = SearchRequest::new(
      Criteria::field("status", "active"),
      SearchOptions::default()
        .order_by("rank", Direction::Desc)
        .limit(1),
    );

    let ids: Vec<String> = apply(docs, &request).into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["c"]);
  }

  #[test]
  fn test_sort_is_stable_on_ties() {
    let docs = vec![
      doc("a", json!({ "team": "x" })),
      doc("b", json!({ "team": "x" })),
      doc("c", json!({ "team": "w" })),
    ];
    let options = SearchOptions::default().order_by("team", Direction::Asc);
    let ids: Vec<String> = order_and_limit(docs, &options)
      .into_iter()
      .map(|d| d.id)
      .collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
  }

  #[test]
  fn test_contains_is_case_insensitive() {
    assert!(contains(&json!("Marie Curie"), "curie"));
    assert!(contains(&json!(12345), "234"));
    assert!(!contains(&Value::Null, "null"));
    assert!(!contains(&json!("Ada"), "bob"));
  }
}
