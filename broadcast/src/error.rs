// src/error.rs

use core::fmt;
use thiserror::Error;

/// Error returned by the broadcaster's control operations.
///
/// Writes never return an error: an admission or delivery drop is reported
/// through `tracing` and the value is lost.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum BroadcastError {
  /// The event loop has shut down (explicit close, lifetime cancellation, or
  /// every `Broadcaster` handle dropped) and no longer serves requests.
  #[error("broadcaster is closed")]
  Closed,
}

/// A specialized `Result` type for broadcaster control operations.
pub type Result<T, E = BroadcastError> = std::result::Result<T, E>;

/// Error returned when a value could not be placed into a mailbox.
/// The rejected value is handed back so it can be reported.
#[derive(Error, PartialEq, Eq, Clone)]
pub enum DeliverError<T> {
  /// The mailbox is at capacity (or, for a rendezvous mailbox, nobody is waiting).
  #[error("mailbox full")]
  Full(T),
  /// The mailbox was closed by its producer or its consumer went away.
  #[error("mailbox closed")]
  Closed(T),
}

impl<T> DeliverError<T> {
  /// Consumes the error, returning the rejected value.
  #[inline]
  pub fn into_inner(self) -> T {
    match self {
      DeliverError::Full(v) | DeliverError::Closed(v) => v,
    }
  }
}

impl<T> fmt::Debug for DeliverError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DeliverError::Full(_) => write!(f, "DeliverError::Full(..)"),
      DeliverError::Closed(_) => write!(f, "DeliverError::Closed(..)"),
    }
  }
}

/// Error returned by `try_recv` on a listener.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
  #[error("listener queue empty")]
  Empty,
  #[error("listener queue disconnected (empty and closed by the broadcaster)")]
  Disconnected,
}

/// Error returned by blocking and async receives on a listener.
///
/// `Disconnected` is the end-of-stream signal: the broadcaster removed the
/// listener or shut down, and every buffered value has been consumed.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum RecvError {
  #[error("listener queue disconnected (empty and closed by the broadcaster)")]
  Disconnected,
}

/// Error returned by `recv_timeout` on a listener.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum RecvErrorTimeout {
  /// The queue is empty and closed.
  #[error("listener queue disconnected")]
  Disconnected,
  /// The timeout elapsed before a value arrived.
  #[error("receive operation timed out")]
  Timeout,
}
