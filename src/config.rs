use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheSettings, DEFAULT_TTL};
use crate::store::{DocumentStore, MemoryStore, RestStore, SqliteStore};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub store: StoreConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

/// Where documents live.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
  /// Remote document service over HTTP
  Rest { url: String },
  /// Local SQLite file (defaults to the platform data directory)
  Sqlite { path: Option<PathBuf> },
  /// Process-local, lost on exit
  Memory,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
  #[serde(default)]
  pub cache_queries: bool,
  #[serde(default)]
  pub serve_stale_on_error: bool,
}

fn default_true() -> bool {
  true
}

fn default_ttl_secs() -> u64 {
  DEFAULT_TTL.as_secs()
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: default_ttl_secs(),
      cache_queries: false,
      serve_stale_on_error: false,
    }
  }
}

impl CacheConfig {
  pub fn settings(&self) -> CacheSettings {
    CacheSettings {
      enabled: self.enabled,
      ttl: Duration::from_secs(self.ttl_secs),
      cache_queries: self.cache_queries,
      serve_stale_on_error: self.serve_stale_on_error,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
  /// Filter directive, e.g. `info` or `hrdesk=debug`
  pub level: Option<String>,
  /// Directory for `hrdesk.log` (defaults to the platform data directory)
  pub dir: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hrdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hrdesk/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/hrdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("hrdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hrdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the document store token from environment variables.
  ///
  /// Checks HRDESK_STORE_TOKEN first, then HRDESK_TOKEN as fallback.
  /// Absent means unauthenticated requests.
  pub fn get_store_token() -> Option<String> {
    std::env::var("HRDESK_STORE_TOKEN")
      .or_else(|_| std::env::var("HRDESK_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  /// Open the configured backend.
  pub fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match &self.store {
      StoreConfig::Rest { url } => Arc::new(RestStore::new(url, Self::get_store_token())?),
      StoreConfig::Sqlite { path } => {
        let path = match path {
          Some(p) => p.clone(),
          None => SqliteStore::default_path()?,
        };
        Arc::new(SqliteStore::open(&path)?)
      }
      StoreConfig::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_rest_config() {
    let config = Config::parse(
      r#"
store:
  backend: rest
  url: https://hr.example.com/v1/documents
cache:
  ttl_secs: 30
  cache_queries: true
log:
  level: debug
"#,
    )
    .unwrap();

    assert_eq!(
      config.store,
      StoreConfig::Rest {
        url: "https://hr.example.com/v1/documents".into()
      }
    );
    let settings = config.cache.settings();
    assert!(settings.enabled);
    assert_eq!(settings.ttl, Duration::from_secs(30));
    assert!(settings.cache_queries);
    assert!(!settings.serve_stale_on_error);
    assert_eq!(config.log.level.as_deref(), Some("debug"));
  }

  #[test]
  fn test_defaults() {
    let config = Config::parse("store:\n  backend: memory\n").unwrap();
    assert_eq!(config.store, StoreConfig::Memory);
    assert_eq!(config.cache.settings(), CacheSettings::default());
    assert_eq!(config.log, LogConfig::default());
  }

  #[test]
  fn test_sqlite_path_optional() {
    let config = Config::parse("store:\n  backend: sqlite\n").unwrap();
    assert_eq!(config.store, StoreConfig::Sqlite { path: None });

    let config = Config::parse("store:\n  backend: sqlite\n  path: /tmp/hr.db\n").unwrap();
    assert_eq!(
      config.store,
      StoreConfig::Sqlite {
        path: Some(PathBuf::from("/tmp/hr.db"))
      }
    );
  }

  #[test]
  fn test_rejects_unknown_backend() {
    assert!(Config::parse("store:\n  backend: firestore\n").is_err());
    assert!(Config::parse("cache:\n  ttl_secs: 5\n").is_err());
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/hrdesk.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_load_and_open_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("store.db");
    let path = dir.path().join("hrdesk.yaml");
    std::fs::write(
      &path,
      format!("store:\n  backend: sqlite\n  path: {}\n", db.display()),
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    config.open_store().unwrap();
    assert!(db.exists());
  }
}
