//! Per-call request state for event-loop driven consumers.
//!
//! A [`Call<T>`] owns one repeatable client request and exposes its state as
//! a value, so two requests against the same collection never overwrite each
//! other's loading or error flags.
//!
//! ```ignore
//! let leaves = registry.client::<Leave>();
//! let mut call = Call::new(move || {
//!   let leaves = leaves.clone();
//!   async move { leaves.search(("status", "pending"), SearchOptions::default()).await }
//! });
//!
//! call.start();
//! // on every tick
//! if call.poll() {
//!   match call.state() {
//!     CallState::Ready(docs) => render(docs),
//!     CallState::Failed(err) => show(err),
//!     _ => {}
//!   }
//! }
//! // when the view goes away before the answer arrived
//! call.detach();
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::error::CollectionError;

#[derive(Debug, Clone, PartialEq)]
pub enum CallState<T> {
  /// Not started, or detached
  Idle,
  Loading,
  Ready(T),
  Failed(CollectionError),
}

impl<T> CallState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, CallState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      CallState::Ready(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&CollectionError> {
    match self {
      CallState::Failed(e) => Some(e),
      _ => None,
    }
  }
}

type CallFuture<T> = Pin<Box<dyn Future<Output = Result<T, CollectionError>> + Send>>;

type Starter<T> = Box<dyn Fn() -> CallFuture<T> + Send + Sync>;

/// One tracked, restartable request.
///
/// The request runs on the tokio runtime; results are picked up by
/// [`poll`](Call::poll). Detaching drops the receiving end so a late answer
/// is discarded, but the request itself still runs to completion.
pub struct Call<T> {
  state: CallState<T>,
  starter: Starter<T>,
  pending: Option<oneshot::Receiver<Result<T, CollectionError>>>,
  settled_at: Option<Instant>,
  stale_after: Duration,
}

impl<T: Send + 'static> Call<T> {
  pub fn new<F, Fut>(starter: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CollectionError>> + Send + 'static,
  {
    Self {
      state: CallState::Idle,
      starter: Box::new(move || Box::pin(starter())),
      pending: None,
      settled_at: None,
      stale_after: crate::cache::DEFAULT_TTL,
    }
  }

  /// How long a ready result counts as current.
  pub fn with_stale_after(mut self, duration: Duration) -> Self {
    self.stale_after = duration;
    self
  }

  pub fn state(&self) -> &CallState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn error(&self) -> Option<&CollectionError> {
    self.state.error()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// True once a ready result is older than the stale window.
  pub fn is_stale(&self) -> bool {
    match (&self.state, self.settled_at) {
      (CallState::Ready(_), Some(at)) => at.elapsed() > self.stale_after,
      (CallState::Ready(_), None) => true,
      _ => false,
    }
  }

  /// Start the request unless one is already running.
  pub fn start(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.launch();
  }

  /// Start over, discarding the answer of any running request.
  pub fn restart(&mut self) {
    self.pending = None;
    self.launch();
  }

  /// Stop listening for the running request and go back to idle.
  pub fn detach(&mut self) {
    self.pending = None;
    if self.state.is_loading() {
      self.state = CallState::Idle;
    }
  }

  /// Pick up a finished result. Returns `true` when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(rx) = self.pending.as_mut() else {
      return false;
    };

    match rx.try_recv() {
      Ok(result) => {
        self.state = match result {
          Ok(data) => CallState::Ready(data),
          Err(err) => CallState::Failed(err),
        };
        self.settled_at = Some(Instant::now());
        self.pending = None;
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        // the task died without answering (panic or runtime shutdown)
        self.state = CallState::Idle;
        self.pending = None;
        true
      }
    }
  }

  fn launch(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.pending = Some(rx);
    self.state = CallState::Loading;

    let request = (self.starter)();
    tokio::spawn(async move {
      let _ = tx.send(request.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Call<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Call")
      .field("state", &self.state)
      .field("settled_at", &self.settled_at)
      .finish_non_exhaustive()
  }
}
