//! User-facing failure notices.
//!
//! The client reports store failures through a [`Notifier`]; what happens
//! with the notice (toast, log line, nothing) is up to the embedding
//! application.

use tracing::warn;

use super::error::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
  Default,
  Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub title: &'static str,
  pub description: &'static str,
  pub variant: NoticeVariant,
}

impl Notice {
  /// The fixed notice for a failed operation.
  pub fn failure(op: Operation) -> Self {
    Self {
      title: "Error",
      description: op.failure_description(),
      variant: NoticeVariant::Destructive,
    }
  }
}

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
  fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, notice: Notice) {
    warn!(title = notice.title, variant = ?notice.variant, "{}", notice.description);
  }
}

/// Drops every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
  fn notify(&self, _notice: Notice) {}
}
