// src/broadcaster.rs

use crate::actor::BroadcastActor;
use crate::config::BroadcastConfig;
use crate::error::{DeliverError, Result};
use crate::listener::{Listener, ListenerId};
use crate::mailbox::{self, MailboxProducer};
use crate::message::{self, Control, Dispatch};
use crate::writer::Writer;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span, Instrument};

struct Shared<T> {
  name: String,
  listener_capacity: usize,
  next_id: AtomicU64,
  data: MailboxProducer<Dispatch<T>>,
  control: mpsc::Sender<Control<T>>,
}

/// A single-producer, multi-listener broadcaster.
///
/// Values written through the [`Writer`] methods are queued on a bounded
/// producer queue and fanned out by a dedicated event loop to every
/// registered [`Listener`], each with its own bounded queue. Nothing on the
/// write path ever blocks: a full producer queue or a full listener queue
/// drops the value and reports it through `tracing`.
///
/// Listener management (`add_listener`, `remove_listener`, `close`) is
/// serialized against dispatch by the same event loop and each call returns
/// only once the change is in effect.
///
/// The handle is cheap to clone. The event loop stops when [`close`](Self::close)
/// is called, when the lifetime token is cancelled, or when every handle has
/// been dropped. Shutdown closes all listener queues.
pub struct Broadcaster<T> {
  shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcaster<T> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> fmt::Debug for Broadcaster<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Broadcaster")
      .field("name", &self.shared.name)
      .field("listener_capacity", &self.shared.listener_capacity)
      .field("closed", &self.shared.control.is_closed())
      .finish_non_exhaustive()
  }
}

impl<T> Broadcaster<T>
where
  T: Clone + Send + fmt::Debug + 'static,
{
  /// Creates a broadcaster and spawns its event loop on the current tokio runtime.
  ///
  /// Cancelling `lifetime` shuts the broadcaster down just like [`close`](Self::close).
  ///
  /// # Panics
  ///
  /// Panics if called outside of a tokio runtime.
  pub fn new(config: BroadcastConfig, lifetime: CancellationToken) -> Self {
    let (data, data_rx) = mailbox::channel(config.capacity);
    let (control, control_rx) = mpsc::channel(1);

    let span = info_span!("broadcaster", name = %config.name);
    let actor = BroadcastActor::new(data_rx, control_rx, lifetime);
    tokio::spawn(actor.run().instrument(span));

    Self {
      shared: Arc::new(Shared {
        name: config.name,
        listener_capacity: config.listener_capacity,
        next_id: AtomicU64::new(0),
        data,
        control,
      }),
    }
  }

  /// Registers a listener and waits until the event loop has applied it.
  ///
  /// A `synchronized` listener receives every value dispatched after this call
  /// returns. An unsynchronized one receives nothing until a write carrying
  /// `synchronize = true` addresses it.
  ///
  /// # Errors
  ///
  /// - `Err(BroadcastError::Closed)`: the broadcaster has shut down.
  pub async fn add_listener(&self, synchronized: bool) -> Result<Listener<T>> {
    let (id, queue, consumer) = self.new_listener_parts();
    message::request(&self.shared.control, |ack| Control::AddListener {
      id,
      queue,
      synchronized,
      ack,
    })
    .await?;
    Ok(Listener::new(id, consumer, self.shared.control.downgrade()))
  }

  /// Adds a listener that receives from the next dispatch on.
  pub async fn add_synced_listener(&self) -> Result<Listener<T>> {
    self.add_listener(true).await
  }

  /// Adds a listener gated until a write with `synchronize = true` reaches it.
  pub async fn add_unsynced_listener(&self) -> Result<Listener<T>> {
    self.add_listener(false).await
  }

  /// Blocking twin of [`add_listener`](Self::add_listener).
  ///
  /// # Panics
  ///
  /// Panics if called from within an asynchronous execution context.
  pub fn add_listener_blocking(&self, synchronized: bool) -> Result<Listener<T>> {
    let (id, queue, consumer) = self.new_listener_parts();
    message::request_blocking(&self.shared.control, |ack| Control::AddListener {
      id,
      queue,
      synchronized,
      ack,
    })?;
    Ok(Listener::new(id, consumer, self.shared.control.downgrade()))
  }

  /// Removes listener `id`, closing its queue, and waits for it to happen.
  ///
  /// Unknown ids are reported and otherwise ignored. Does nothing once the
  /// broadcaster has shut down.
  pub async fn remove_listener(&self, id: ListenerId) {
    let _ = message::request(&self.shared.control, |ack| Control::RemoveListener { id, ack }).await;
  }

  /// Blocking twin of [`remove_listener`](Self::remove_listener).
  ///
  /// # Panics
  ///
  /// Panics if called from within an asynchronous execution context.
  pub fn remove_listener_blocking(&self, id: ListenerId) {
    let _ = message::request_blocking(&self.shared.control, |ack| Control::RemoveListener { id, ack });
  }
}

impl<T> Broadcaster<T> {
  /// Shuts the broadcaster down and waits for the teardown to finish.
  ///
  /// Every listener queue is closed, then the producer and control queues.
  /// Idempotent: calling it again, or after a cancellation, returns at once.
  pub async fn close(&self) {
    let _ = message::request(&self.shared.control, |ack| Control::Close { ack }).await;
  }

  /// Blocking twin of [`close`](Self::close).
  ///
  /// # Panics
  ///
  /// Panics if called from within an asynchronous execution context.
  pub fn close_blocking(&self) {
    let _ = message::request_blocking(&self.shared.control, |ack| Control::Close { ack });
  }

  /// Resolves once the event loop has shut down.
  pub async fn closed(&self) {
    self.shared.control.closed().await
  }

  /// Returns `true` once the event loop has shut down.
  pub fn is_closed(&self) -> bool {
    self.shared.control.is_closed()
  }

  /// The diagnostic name given at construction.
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  /// Number of writes dropped because the producer queue was full.
  pub fn dropped_count(&self) -> u64 {
    self.shared.data.dropped_count()
  }

  fn new_listener_parts(
    &self,
  ) -> (
    ListenerId,
    MailboxProducer<T>,
    mailbox::MailboxConsumer<T>,
  ) {
    let id = ListenerId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1);
    let (queue, consumer) = mailbox::channel(self.shared.listener_capacity);
    (id, queue, consumer)
  }
}

impl<T: fmt::Debug> Broadcaster<T> {
  fn submit(&self, msg: Dispatch<T>) {
    if let Err(err) = self.shared.data.try_deliver(msg) {
      let reason = match &err {
        DeliverError::Full(_) => "full",
        DeliverError::Closed(_) => "closed",
      };
      let msg = err.into_inner();
      error!(
        broadcaster = %self.shared.name,
        kind = msg.kind(),
        reason,
        value = ?msg.value(),
        "unable to write"
      );
    }
  }
}

impl<T: fmt::Debug> Writer<T> for Broadcaster<T> {
  fn write(&self, value: T, synchronize: bool) {
    self.submit(Dispatch::ForAll { value, synchronize });
  }

  fn write_for_listener(&self, id: ListenerId, value: T, synchronize: bool) {
    self.submit(Dispatch::ForListener {
      id,
      value,
      synchronize,
    });
  }

  fn write_for_listener_and_everyone_else(
    &self,
    id: ListenerId,
    value: T,
    value_else: T,
    synchronize: bool,
  ) {
    self.submit(Dispatch::ForListenerAndEveryoneElse {
      id,
      value,
      value_else,
      synchronize,
    });
  }
}
