//! Driver for a JSON-over-HTTP document API.
//!
//! Routes, relative to the configured base URL:
//! - `GET    {base}/{collection}`        every document
//! - `GET    {base}/{collection}/{id}`   one document (404 means absent)
//! - `POST   {base}/{collection}:query`  filtered query
//! - `POST   {base}/{collection}`        create, answers `{"id": ...}`
//! - `PATCH  {base}/{collection}/{id}`   merge fields
//! - `DELETE {base}/{collection}/{id}`   delete (404 is success)

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::query::SearchRequest;
use super::{Document, DocumentStore, Record, StoreError};

#[derive(Debug, Deserialize)]
struct ApiDocument {
  id: String,
  #[serde(default)]
  fields: Record,
}

impl From<ApiDocument> for Document<Record> {
  fn from(doc: ApiDocument) -> Self {
    Document::new(doc.id, doc.fields)
  }
}

#[derive(Debug, Deserialize)]
struct ApiDocumentList {
  #[serde(default)]
  documents: Vec<ApiDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiCreated {
  id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  code: Option<String>,
  message: Option<String>,
}

/// HTTP document store client
#[derive(Clone)]
pub struct RestStore {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl RestStore {
  pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid store URL {}: {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Store URL {} cannot hold collection paths", base_url));
    }

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| StoreError::new("invalid-argument", "Store URL cannot hold paths"))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
    self.url(&[collection])
  }

  /// `.` and `..` would be dropped as dot segments and address the
  /// collection itself, so they are refused.
  fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
    if id == "." || id == ".." {
      return Err(StoreError::new(
        "invalid-argument",
        format!("{:?} is not a valid document id", id),
      ));
    }
    self.url(&[collection, id])
  }

  fn query_url(&self, collection: &str) -> Result<Url, StoreError> {
    self.url(&[&format!("{}:query", collection)])
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
    let request = match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    };
    request.send().await.map_err(transport_error)
  }

  async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
      .json::<T>()
      .await
      .map_err(|e| StoreError::new("data-loss", format!("Malformed store response: {}", e)))
  }
}

fn transport_error(e: reqwest::Error) -> StoreError {
  if e.is_timeout() {
    StoreError::new("deadline-exceeded", format!("Store request timed out: {}", e))
  } else {
    StoreError::unavailable(format!("Store unreachable: {}", e))
  }
}

/// Map an HTTP status to a document-store error code.
fn status_code(status: StatusCode) -> Option<&'static str> {
  match status.as_u16() {
    400 => Some("invalid-argument"),
    401 => Some("unauthenticated"),
    403 => Some("permission-denied"),
    404 => Some("not-found"),
    409 => Some("already-exists"),
    429 => Some("resource-exhausted"),
    503 => Some("unavailable"),
    504 => Some("deadline-exceeded"),
    500..=599 => Some("internal"),
    _ => None,
  }
}

/// Build a `StoreError` from a failed response body.
fn parse_error(status: StatusCode, body: &str) -> StoreError {
  let parsed = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
  let code = parsed
    .as_ref()
    .and_then(|e| e.code.clone())
    .or_else(|| status_code(status).map(String::from));
  let message = parsed
    .and_then(|e| e.message)
    .unwrap_or_else(|| format!("Store returned {}", status));

  StoreError { code, message }
}

async fn error_from(response: Response) -> StoreError {
  let status = response.status();
  let body = response.text().await.unwrap_or_default();
  parse_error(status, &body)
}

#[async_trait]
impl DocumentStore for RestStore {
  async fn fetch_all(&self, collection: &str) -> Result<Vec<Document<Record>>, StoreError> {
    let url = self.collection_url(collection)?;
    debug!(%url, "fetch all");
    let response = self.send(self.http.get(url)).await?;
    if !response.status().is_success() {
      return Err(error_from(response).await);
    }
    let list: ApiDocumentList = Self::read_json(response).await?;
    Ok(list.documents.into_iter().map(Document::from).collect())
  }

  async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
    let url = self.document_url(collection, id)?;
    debug!(%url, "fetch document");
    let response = self.send(self.http.get(url)).await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !response.status().is_success() {
      return Err(error_from(response).await);
    }
    let doc: ApiDocument = Self::read_json(response).await?;
    Ok(Some(doc.fields))
  }

  async fn query(
    &self,
    collection: &str,
    request: &SearchRequest,
  ) -> Result<Vec<Document<Record>>, StoreError> {
    let url = self.query_url(collection)?;
    debug!(%url, filters = request.filters.filters().len(), "query");
    let response = self.send(self.http.post(url).json(request)).await?;
    if !response.status().is_success() {
      return Err(error_from(response).await);
    }
    let list: ApiDocumentList = Self::read_json(response).await?;
    Ok(list.documents.into_iter().map(Document::from).collect())
  }

  async fn create(&self, collection: &str, data: Record) -> Result<String, StoreError> {
    let url = self.collection_url(collection)?;
    let response = self.send(self.http.post(url).json(&data)).await?;
    if !response.status().is_success() {
      return Err(error_from(response).await);
    }
    let created: ApiCreated = Self::read_json(response).await?;
    Ok(created.id)
  }

  async fn merge(&self, collection: &str, id: &str, fields: Record) -> Result<(), StoreError> {
    let url = self.document_url(collection, id)?;
    let response = self.send(self.http.patch(url).json(&fields)).await?;
    if !response.status().is_success() {
      return Err(error_from(response).await);
    }
    Ok(())
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    let url = self.document_url(collection, id)?;
    let response = self.send(self.http.delete(url)).await?;
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_FOUND {
      return Ok(());
    }
    Err(error_from(response).await)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{Criteria, Direction, SearchOptions};
  use serde_json::{json, Value};
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::task::JoinHandle;

  /// A request as the server saw it.
  #[derive(Debug)]
  struct Seen {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
  }

  impl Seen {
    fn json(&self) -> Value {
      serde_json::from_str(&self.body).unwrap()
    }
  }

  async fn read_request(socket: &mut tokio::net::TcpStream) -> Seen {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
      let n = socket.read(&mut chunk).await.unwrap();
      assert!(n > 0, "connection closed before headers");
      buf.extend_from_slice(&chunk[..n]);
      if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        break pos + 4;
      }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap().split_whitespace();
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
      if let Some((name, value)) = line.split_once(':') {
        match name.trim().to_lowercase().as_str() {
          "content-length" => content_length = value.trim().parse().unwrap(),
          "authorization" => authorization = Some(value.trim().to_string()),
          _ => {}
        }
      }
    }

    while buf.len() < header_end + content_length {
      let n = socket.read(&mut chunk).await.unwrap();
      assert!(n > 0, "connection closed before body");
      buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();

    Seen {
      method,
      path,
      authorization,
      body,
    }
  }

  /// Answer one connection per canned `(status, body)` pair, in order.
  async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Seen>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
      let mut seen = Vec::new();
      for (status, body) in responses {
        let (mut socket, _) = listener.accept().await.unwrap();
        seen.push(read_request(&mut socket).await);
        let response = format!(
          "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
          status,
          body.len(),
          body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
      }
      seen
    });

    (base, handle)
  }

  #[tokio::test]
  async fn test_fetch_by_id_not_found_is_none() {
    let (base, server) = serve(vec![
      (404, r#"{"error":{"code":"not-found","message":"no such document"}}"#),
      (200, r#"{"id":"e1","fields":{"firstName":"Ada"}}"#),
    ])
    .await;
    let store = RestStore::new(&base, Some("secret".into())).unwrap();

    assert_eq!(store.fetch_by_id("employees", "ghost").await.unwrap(), None);
    let found = store.fetch_by_id("employees", "e1").await.unwrap().unwrap();
    assert_eq!(found["firstName"], "Ada");

    let seen = server.await.unwrap();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/v1/employees/ghost");
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer secret"));
  }

  #[tokio::test]
  async fn test_delete_tolerates_missing_document() {
    let (base, server) = serve(vec![
      (404, ""),
      (
        500,
        r#"{"error":{"code":"aborted","message":"transaction contention"}}"#,
      ),
    ])
    .await;
    let store = RestStore::new(&base, None).unwrap();

    store.delete("badges", "b1").await.unwrap();
    let err = store.delete("badges", "b2").await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("aborted"));
    assert_eq!(err.message, "transaction contention");

    let seen = server.await.unwrap();
    assert_eq!(seen[0].method, "DELETE");
    assert_eq!(seen[1].path, "/v1/badges/b2");
    assert!(seen[0].authorization.is_none());
  }

  #[tokio::test]
  async fn test_merge_error_body_reaches_caller() {
    let (base, server) = serve(vec![(
      403,
      r#"{"error":{"code":"permission-denied","message":"Rules rejected write"}}"#,
    )])
    .await;
    let store = RestStore::new(&base, None).unwrap();

    let mut fields = Record::new();
    fields.insert("status".into(), json!("revoked"));
    let err = store.merge("badges", "b1", fields).await.unwrap_err();
    assert_eq!(
      err,
      StoreError::new("permission-denied", "Rules rejected write")
    );

    let seen = server.await.unwrap();
    assert_eq!(seen[0].method, "PATCH");
    assert_eq!(seen[0].path, "/v1/badges/b1");
    assert_eq!(seen[0].json(), json!({"status": "revoked"}));
  }

  #[tokio::test]
  async fn test_query_posts_search_request() {
    let (base, server) = serve(vec![(
      200,
      r#"{"documents":[{"id":"l1","fields":{"status":"pending"}}]}"#,
    )])
    .await;
    let store = RestStore::new(&base, None).unwrap();

    let request = SearchRequest::new(
      Criteria::field("status", "pending"),
      SearchOptions::default()
        .order_by("startDate", Direction::Desc)
        .limit(2),
    );
    let docs = store.query("leaves", &request).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "l1");

    let seen = server.await.unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/v1/leaves:query");
    assert_eq!(
      seen[0].json(),
      json!({
        "filters": [{"field": "status", "value": "pending"}],
        "orderBy": {"field": "startDate", "direction": "desc"},
        "limit": 2
      })
    );
  }

  #[tokio::test]
  async fn test_dot_ids_never_reach_the_network() {
    // nothing listens on port 9, so a request would fail as unavailable
    let store = RestStore::new("http://127.0.0.1:9/v1", None).unwrap();
    let err = store.delete("badges", "..").await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("invalid-argument"));
    let err = store.fetch_by_id("badges", ".").await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("invalid-argument"));
  }

  #[test]
  fn test_urls_append_to_base_path() {
    let store = RestStore::new("https://hr.example.com/v1/documents/", None).unwrap();
    assert_eq!(
      store.collection_url("employees").unwrap().as_str(),
      "https://hr.example.com/v1/documents/employees"
    );
    assert_eq!(
      store.document_url("employees", "e 1").unwrap().as_str(),
      "https://hr.example.com/v1/documents/employees/e%201"
    );
    assert_eq!(
      store.query_url("leaves").unwrap().as_str(),
      "https://hr.example.com/v1/documents/leaves:query"
    );
  }

  #[test]
  fn test_ids_cannot_escape_collection() {
    let store = RestStore::new("https://hr.example.com/v1", None).unwrap();
    assert_eq!(
      store.document_url("badges", "../admin").unwrap().as_str(),
      "https://hr.example.com/v1/badges/..%2Fadmin"
    );
  }

  #[test]
  fn test_dot_ids_do_not_address_the_collection() {
    let store = RestStore::new("https://hr.example.com/v1", None).unwrap();
    for id in [".", ".."] {
      let err = store.document_url("badges", id).unwrap_err();
      assert_eq!(err.code.as_deref(), Some("invalid-argument"));
    }
    assert_eq!(
      store.document_url("badges", "...").unwrap().as_str(),
      "https://hr.example.com/v1/badges/..."
    );
  }

  #[test]
  fn test_rejects_non_base_url() {
    assert!(RestStore::new("mailto:hr@example.com", None).is_err());
    assert!(RestStore::new("not a url", None).is_err());
  }

  #[test]
  fn test_error_body_code_wins() {
    let err = parse_error(
      StatusCode::BAD_REQUEST,
      r#"{"error":{"code":"permission-denied","message":"Rules rejected write"}}"#,
    );
    assert_eq!(err.code.as_deref(), Some("permission-denied"));
    assert_eq!(err.message, "Rules rejected write");
  }

  #[test]
  fn test_status_fallback_without_body() {
    let err = parse_error(StatusCode::SERVICE_UNAVAILABLE, "<html>down</html>");
    assert_eq!(err.code.as_deref(), Some("unavailable"));
    assert_eq!(err.message, "Store returned 503 Service Unavailable");

    let err = parse_error(StatusCode::IM_A_TEAPOT, "");
    assert!(err.code.is_none());
  }
}
