use std::{future, time::Duration};

use futures_util::future::select_all;
use thiserror::Error;
use tokio::{sync::watch, time::Instant};

/// Cancellation signal and deadline of a call.
///
/// Clones share the same cancellation signals, so a [`CancelHandle`] aborts every
/// call which was given a clone of its context, or of a context derived from it.
#[derive(Debug, Clone, Default)]
pub struct Context {
  cancel: Vec<watch::Receiver<bool>>,
  deadline: Option<Instant>,
}

/// Cancels the [`Context`] it was created with.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] does not cancel the context.
#[derive(Debug)]
pub struct CancelHandle {
  tx: watch::Sender<bool>,
}

impl CancelHandle {
  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }
}

/// Reason why a context is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
  #[error("context canceled")]
  Canceled,

  #[error("context deadline exceeded")]
  DeadlineExceeded,
}

impl Context {
  /// A context which is never canceled and has no deadline.
  pub fn background() -> Self {
    Self::default()
  }

  /// Derive a context which can additionally be canceled through the returned handle.
  pub fn with_cancel(mut self) -> (Self, CancelHandle) {
    let (tx, rx) = watch::channel(false);
    self.cancel.push(rx);
    return (self, CancelHandle { tx });
  }

  /// Derive a context which expires `timeout` from now.
  pub fn with_timeout(self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  /// Derive a context which expires at `deadline`.
  ///
  /// An earlier deadline inherited from `self` is kept.
  pub fn with_deadline(self, deadline: Instant) -> Self {
    let deadline = match self.deadline {
      Some(d) if d < deadline => d,
      _ => deadline,
    };
    Self {
      deadline: Some(deadline),
      ..self
    }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Returns the reason if the context is already done, without waiting.
  pub fn err(&self) -> Option<ContextError> {
    if self.cancel.iter().any(|rx| *rx.borrow()) {
      return Some(ContextError::Canceled);
    }
    match self.deadline {
      Some(d) if d <= Instant::now() => Some(ContextError::DeadlineExceeded),
      _ => None,
    }
  }

  /// Wait until the context is done and return the reason.
  ///
  /// Never resolves for a context without cancellation and deadline.
  pub async fn done(&self) -> ContextError {
    let canceled = async {
      if self.cancel.is_empty() {
        future::pending::<()>().await;
      }
      select_all(
        self
          .cancel
          .iter()
          .cloned()
          .map(|rx| Box::pin(wait_canceled(rx))),
      )
      .await;
    };
    let expired = async {
      match self.deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => future::pending::<()>().await,
      }
    };

    tokio::select! {
      biased;
      _ = canceled => ContextError::Canceled,
      _ = expired => ContextError::DeadlineExceeded,
    }
  }
}

/// Resolves once the signal is raised.
async fn wait_canceled(mut rx: watch::Receiver<bool>) {
  loop {
    let canceled = *rx.borrow_and_update();
    if canceled {
      return;
    }
    if rx.changed().await.is_err() {
      // The handle is gone, nobody can cancel anymore.
      future::pending::<()>().await;
    }
  }
}
