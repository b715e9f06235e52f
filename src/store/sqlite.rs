//! SQLite-backed local document store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::filter;
use super::query::SearchRequest;
use super::{new_document_id, Document, DocumentStore, Record, StoreError};

/// Document store persisted in a single SQLite file.
///
/// Documents are JSON blobs keyed by `(collection, id)`; the `seq` column
/// keeps insertion order for unordered reads.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the document table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    UNIQUE (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection, seq);
"#;

impl SqliteStore {
  /// Open the store at `path`, creating parent directories as needed.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// A throwaway store living only in memory.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("hrdesk").join("store.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::unavailable(format!("Lock poisoned: {}", e)))
  }

  fn load_collection(&self, collection: &str) -> Result<Vec<Document<Record>>, StoreError> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT id, data FROM documents WHERE collection = ? ORDER BY seq")
      .map_err(|e| sql_error("prepare collection scan", e))?;

    let rows = stmt
      .query_map(params![collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
      })
      .map_err(|e| sql_error("scan collection", e))?;

    let mut docs = Vec::new();
    for row in rows {
      let (id, data) = row.map_err(|e| sql_error("read row", e))?;
      docs.push(Document::new(id, decode(&data)?));
    }
    Ok(docs)
  }

  fn load_one(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
    let conn = self.lock()?;
    let data: Option<String> = conn
      .query_row(
        "SELECT data FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| sql_error("fetch document", e))?;

    data.as_deref().map(decode).transpose()
  }

  fn insert(&self, collection: &str, data: &Record) -> Result<String, StoreError> {
    let id = new_document_id(collection);
    let body = encode(data)?;
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)",
        params![collection, id, body],
      )
      .map_err(|e| sql_error("insert document", e))?;
    Ok(id)
  }

  fn merge_fields(&self, collection: &str, id: &str, fields: Record) -> Result<(), StoreError> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| sql_error("begin transaction", e))?;

    let current: Option<String> = tx
      .query_row(
        "SELECT data FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| sql_error("fetch document", e))?;

    let mut record = match current {
      Some(data) => decode(&data)?,
      None => return Err(StoreError::not_found(collection, id)),
    };
    record.extend(fields);

    tx.execute(
      "UPDATE documents SET data = ? WHERE collection = ? AND id = ?",
      params![encode(&record)?, collection, id],
    )
    .map_err(|e| sql_error("update document", e))?;

    tx.commit().map_err(|e| sql_error("commit", e))
  }

  fn delete_one(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    let conn = self.lock()?;
    conn
      .execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
      )
      .map_err(|e| sql_error("delete document", e))?;
    Ok(())
  }
}

fn sql_error(action: &str, e: rusqlite::Error) -> StoreError {
  StoreError::internal(format!("Failed to {}: {}", action, e))
}

fn decode(data: &str) -> Result<Record, StoreError> {
  serde_json::from_str(data)
    .map_err(|e| StoreError::new("data-loss", format!("Corrupt document body: {}", e)))
}

fn encode(record: &Record) -> Result<String, StoreError> {
  serde_json::to_string(record)
    .map_err(|e| StoreError::new("invalid-argument", format!("Failed to serialize document: {}", e)))
}

#[async_trait]
impl DocumentStore for SqliteStore {
  async fn fetch_all(&self, collection: &str) -> Result<Vec<Document<Record>>, StoreError> {
    self.load_collection(collection)
  }

  async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
    self.load_one(collection, id)
  }

  async fn query(
    &self,
    collection: &str,
    request: &SearchRequest,
  ) -> Result<Vec<Document<Record>>, StoreError> {
    // Filtering happens in Rust so numeric equality matches the other backends.
    let docs = self.load_collection(collection)?;
    Ok(filter::apply(docs, request))
  }

  async fn create(&self, collection: &str, data: Record) -> Result<String, StoreError> {
    self.insert(collection, &data)
  }

  async fn merge(&self, collection: &str, id: &str, fields: Record) -> Result<(), StoreError> {
    self.merge_fields(collection, id, fields)
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    self.delete_one(collection, id)
  }
}
