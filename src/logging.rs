//! File logging.
//!
//! Stdout belongs to command output, so events go to `hrdesk.log` only.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

pub const LOG_ENV: &str = "HRDESK_LOG";
pub const LOG_FILE: &str = "hrdesk.log";

fn log_dir(config: &LogConfig) -> Result<PathBuf> {
  if let Some(dir) = &config.dir {
    return Ok(dir.clone());
  }
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;
  Ok(data_dir.join("hrdesk"))
}

/// `HRDESK_LOG` wins over the configured level; `info` otherwise.
fn filter(config: &LogConfig) -> Result<EnvFilter> {
  if let Ok(directives) = std::env::var(LOG_ENV) {
    return EnvFilter::try_new(&directives)
      .map_err(|e| eyre!("Invalid {} filter {:?}: {}", LOG_ENV, directives, e));
  }
  let level = config.level.as_deref().unwrap_or("info");
  EnvFilter::try_new(level).map_err(|e| eyre!("Invalid log level {:?}: {}", level, e))
}

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines get flushed.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
  let dir = log_dir(config)?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter(config)?)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_configured_dir_wins() {
    let config = LogConfig {
      level: None,
      dir: Some(PathBuf::from("/var/log/hrdesk")),
    };
    assert_eq!(log_dir(&config).unwrap(), PathBuf::from("/var/log/hrdesk"));
  }

  #[test]
  fn test_level_directive() {
    let config = LogConfig {
      level: Some("hrdesk=debug,warn".into()),
      dir: None,
    };
    if std::env::var(LOG_ENV).is_err() {
      let filter = filter(&config).unwrap();
      assert!(filter.to_string().contains("hrdesk=debug"));
    }
  }
}
