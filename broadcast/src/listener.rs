// src/listener.rs

//! The consumer-facing listener handle.

use crate::error::{RecvError, RecvErrorTimeout, TryRecvError};
use crate::mailbox::MailboxConsumer;
use crate::message::{self, Control};

use futures_core::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

/// Identifier of a listener, unique for the lifetime of its broadcaster.
///
/// Identifiers start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
  #[inline]
  pub const fn new(raw: u64) -> Self {
    Self(raw)
  }

  #[inline]
  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for ListenerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u64> for ListenerId {
  fn from(raw: u64) -> Self {
    Self(raw)
  }
}

/// A registered consumer of a [`Broadcaster`](crate::Broadcaster).
///
/// The listener owns the receiving end of its private bounded queue and only a
/// weak reference to the broadcaster, so holding it never keeps the event loop
/// alive. When the broadcaster removes the listener (or shuts down) the queue
/// is closed: buffered values can still be drained, after which every receive
/// reports end-of-stream ([`RecvError::Disconnected`], or `None` from the
/// [`Stream`] implementation). Treat that as a normal termination.
///
/// Dropping the handle without calling [`close`](Self::close) discards its
/// queue; the broadcaster prunes the listener on its next delivery attempt.
pub struct Listener<T> {
  id: ListenerId,
  queue: MailboxConsumer<T>,
  control: mpsc::WeakSender<Control<T>>,
}

impl<T> Listener<T> {
  pub(crate) fn new(
    id: ListenerId,
    queue: MailboxConsumer<T>,
    control: mpsc::WeakSender<Control<T>>,
  ) -> Self {
    Self { id, queue, control }
  }

  /// Returns the stable identifier of this listener.
  #[inline]
  pub fn id(&self) -> ListenerId {
    self.id
  }

  /// Waits for the next value.
  ///
  /// # Errors
  ///
  /// - `Err(RecvError::Disconnected)`: the listener was removed or the
  ///   broadcaster shut down, and the queue has been drained.
  pub async fn recv(&self) -> Result<T, RecvError> {
    self.queue.recv_async().await
  }

  /// Blocks the current thread until the next value arrives.
  pub fn recv_blocking(&self) -> Result<T, RecvError> {
    self.queue.recv_sync()
  }

  /// Blocks the current thread for at most `timeout` waiting for a value.
  pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvErrorTimeout> {
    self.queue.recv_timeout_sync(timeout)
  }

  /// Attempts to receive a value without blocking.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    self.queue.try_recv()
  }

  /// Number of values currently buffered. Never exceeds [`capacity`](Self::capacity)
  /// for a non-zero capacity.
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.queue.capacity()
  }

  /// Number of values dropped for this listener because its queue was full.
  pub fn dropped_count(&self) -> u64 {
    self.queue.dropped_count()
  }

  /// Returns `true` once the broadcaster has closed this listener's queue.
  /// Buffered values may still be pending.
  pub fn is_closed(&self) -> bool {
    self.queue.is_closed()
  }

  /// Asks the broadcaster to remove this listener and waits for it to happen.
  ///
  /// The handle stays usable for draining what is left in the queue. Closing
  /// after the broadcaster has shut down returns immediately.
  pub async fn close(&self) {
    if let Some(control) = self.control.upgrade() {
      let id = self.id;
      // A closed broadcaster has already released this listener.
      let _ = message::request(&control, |ack| Control::RemoveListener { id, ack }).await;
    }
  }

  /// Blocking twin of [`close`](Self::close).
  ///
  /// # Panics
  ///
  /// Panics if called from within an asynchronous execution context.
  pub fn close_blocking(&self) {
    if let Some(control) = self.control.upgrade() {
      let id = self.id;
      let _ = message::request_blocking(&control, |ack| Control::RemoveListener { id, ack });
    }
  }
}

/// Yields values until end-of-stream.
///
/// A pending `poll_next` leaves the task's waker registered until the next
/// value or close arrives, even if the caller stops polling. On a
/// zero-capacity listener that registration counts as a waiting consumer, so
/// a value may be accepted while nobody is polling; it stays buffered for the
/// next poll. Use [`recv`](Listener::recv) in `select!` arms on such
/// listeners: its future unregisters when dropped.
impl<T> Stream for Listener<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
    match self.queue.poll_recv(cx) {
      Poll::Ready(Ok(value)) => Poll::Ready(Some(value)),
      Poll::Ready(Err(RecvError::Disconnected)) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> fmt::Debug for Listener<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Listener")
      .field("id", &self.id)
      .field("len", &self.queue.len())
      .field("capacity", &self.queue.capacity())
      .field("closed", &self.queue.is_closed())
      .finish()
  }
}
