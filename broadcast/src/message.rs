// src/message.rs

//! Messages carried by the broadcaster's two queues.
//!
//! Data flows through [`Dispatch`] on the bounded producer queue. Structural
//! changes flow through [`Control`] and each carries a private acknowledgment
//! that the event loop resolves once the change has been applied.

use crate::error::{BroadcastError, Result};
use crate::listener::ListenerId;
use crate::mailbox::MailboxProducer;

use tokio::sync::{mpsc, oneshot};

/// One addressing intent, produced by a `Writer` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Dispatch<T> {
  /// Deliver `value` to every listener.
  ForAll { value: T, synchronize: bool },
  /// Deliver `value` only to listener `id`.
  ForListener {
    id: ListenerId,
    value: T,
    synchronize: bool,
  },
  /// Deliver `value` to listener `id` and `value_else` to all others.
  ForListenerAndEveryoneElse {
    id: ListenerId,
    value: T,
    value_else: T,
    synchronize: bool,
  },
}

impl<T> Dispatch<T> {
  /// Short name used in diagnostics.
  pub(crate) fn kind(&self) -> &'static str {
    match self {
      Dispatch::ForAll { .. } => "for_all",
      Dispatch::ForListener { .. } => "for_listener",
      Dispatch::ForListenerAndEveryoneElse { .. } => "for_listener_and_everyone_else",
    }
  }

  /// The primary value of the message.
  pub(crate) fn value(&self) -> &T {
    match self {
      Dispatch::ForAll { value, .. }
      | Dispatch::ForListener { value, .. }
      | Dispatch::ForListenerAndEveryoneElse { value, .. } => value,
    }
  }
}

pub(crate) type Ack = oneshot::Sender<()>;

/// A structural request, serialized against data dispatch by the event loop.
#[derive(Debug)]
pub(crate) enum Control<T> {
  AddListener {
    id: ListenerId,
    queue: MailboxProducer<T>,
    synchronized: bool,
    ack: Ack,
  },
  RemoveListener {
    id: ListenerId,
    ack: Ack,
  },
  Close {
    ack: Ack,
  },
}

/// Submits a control request and waits for the event loop to acknowledge it.
///
/// A request that cannot be queued, or whose acknowledgment is dropped
/// because the loop exited first, resolves to [`BroadcastError::Closed`].
pub(crate) async fn request<T, F>(control: &mpsc::Sender<Control<T>>, build: F) -> Result<()>
where
  F: FnOnce(Ack) -> Control<T>,
{
  let (ack, done) = oneshot::channel();
  control
    .send(build(ack))
    .await
    .map_err(|_| BroadcastError::Closed)?;
  done.await.map_err(|_| BroadcastError::Closed)
}

/// Blocking twin of [`request`].
///
/// # Panics
///
/// Panics if called from within an asynchronous execution context.
pub(crate) fn request_blocking<T, F>(control: &mpsc::Sender<Control<T>>, build: F) -> Result<()>
where
  F: FnOnce(Ack) -> Control<T>,
{
  let (ack, done) = oneshot::channel();
  control
    .blocking_send(build(ack))
    .map_err(|_| BroadcastError::Closed)?;
  done.blocking_recv().map_err(|_| BroadcastError::Closed)
}
