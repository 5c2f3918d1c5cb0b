// src/mailbox.rs

//! A bounded, single-consumer mailbox with non-blocking delivery.
//!
//! Every queue in the broadcaster is a mailbox: the producer queue feeding the
//! event loop and the private queue of each listener.
//!
//! ## Behavior
//!
//! - **Never blocks the producer**: `try_deliver` either enqueues the value or
//!   hands it back inside a [`DeliverError`]. A full mailbox counts the drop.
//! - **Rendezvous at capacity 0**: a zero-capacity mailbox accepts a value only
//!   while its consumer is parked (sync) or pending (async) on an empty buffer.
//! - **Close once**: either side may close. Closing is idempotent and reports
//!   whether this call performed the transition. Values already buffered stay
//!   readable; after that the consumer sees end-of-stream.
//! - **Sync/Async Agnostic**: the consumer can block a thread or await a future.

use crate::error::{DeliverError, RecvError, RecvErrorTimeout, TryRecvError};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

// --- Waiter & Internal State ---

/// Represents either a sync or async waiter.
#[derive(Debug)]
enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  /// Wakes the underlying thread or task.
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

#[derive(Debug)]
struct MailboxInternal<T> {
  buffer: VecDeque<T>,
  capacity: usize,
  /// The single consumer waiting for a value.
  consumer_waiter: Option<Waiter>,
  closed: bool,
  /// Values rejected because the mailbox was full.
  dropped_count: u64,
}

impl<T> MailboxInternal<T> {
  fn has_room(&self) -> bool {
    if self.capacity == 0 {
      self.buffer.is_empty() && self.consumer_waiter.is_some()
    } else {
      self.buffer.len() < self.capacity
    }
  }

  fn wake_consumer(&mut self) {
    if let Some(waiter) = self.consumer_waiter.take() {
      waiter.wake();
    }
  }

  fn close(&mut self) -> bool {
    if self.closed {
      return false;
    }
    self.closed = true;
    self.wake_consumer();
    true
  }
}

#[derive(Debug)]
struct MailboxShared<T> {
  internal: Mutex<MailboxInternal<T>>,
}

// --- Handles ---

/// The delivering side of a mailbox.
///
/// Dropping the producer closes the mailbox.
#[derive(Debug)]
pub(crate) struct MailboxProducer<T> {
  shared: Arc<MailboxShared<T>>,
}

/// The receiving side of a mailbox.
///
/// Dropping the consumer closes the mailbox and discards anything buffered,
/// so later deliveries fail with [`DeliverError::Closed`].
#[derive(Debug)]
pub(crate) struct MailboxConsumer<T> {
  shared: Arc<MailboxShared<T>>,
}

/// Creates a new mailbox with the given capacity.
pub(crate) fn channel<T>(capacity: usize) -> (MailboxProducer<T>, MailboxConsumer<T>) {
  let internal = MailboxInternal {
    buffer: VecDeque::with_capacity(capacity),
    capacity,
    consumer_waiter: None,
    closed: false,
    dropped_count: 0,
  };
  let shared = Arc::new(MailboxShared {
    internal: Mutex::new(internal),
  });
  (
    MailboxProducer {
      shared: shared.clone(),
    },
    MailboxConsumer { shared },
  )
}

// --- Producer Implementation ---

impl<T> MailboxProducer<T> {
  /// Attempts to deliver a value without blocking.
  pub(crate) fn try_deliver(&self, value: T) -> Result<(), DeliverError<T>> {
    let mut guard = self.shared.internal.lock();

    if guard.closed {
      return Err(DeliverError::Closed(value));
    }
    if !guard.has_room() {
      guard.dropped_count += 1;
      return Err(DeliverError::Full(value));
    }

    guard.buffer.push_back(value);
    guard.wake_consumer();
    Ok(())
  }

  /// Closes the mailbox. Returns `false` if it was already closed.
  pub(crate) fn close(&self) -> bool {
    self.shared.internal.lock().close()
  }

  pub(crate) fn dropped_count(&self) -> u64 {
    self.shared.internal.lock().dropped_count
  }

  /// Returns `true` once either side has closed the mailbox, including when
  /// the consumer was dropped.
  pub(crate) fn is_closed(&self) -> bool {
    self.shared.internal.lock().closed
  }
}

impl<T> Drop for MailboxProducer<T> {
  fn drop(&mut self) {
    self.close();
  }
}

// --- Consumer Implementation ---

impl<T> MailboxConsumer<T> {
  /// Attempts to receive a value without blocking.
  pub(crate) fn try_recv(&self) -> Result<T, TryRecvError> {
    let mut guard = self.shared.internal.lock();

    if let Some(value) = guard.buffer.pop_front() {
      Ok(value)
    } else if guard.closed {
      Err(TryRecvError::Disconnected)
    } else {
      Err(TryRecvError::Empty)
    }
  }

  /// Receives a value, blocking the current thread while the mailbox is empty.
  pub(crate) fn recv_sync(&self) -> Result<T, RecvError> {
    loop {
      let mut guard = self.shared.internal.lock();
      if let Some(value) = guard.buffer.pop_front() {
        return Ok(value);
      }
      if guard.closed {
        return Err(RecvError::Disconnected);
      }
      guard.consumer_waiter = Some(Waiter::Sync(thread::current()));
      drop(guard); // Unlock before parking.
      thread::park();
    }
  }

  /// Receives a value, blocking the current thread for at most `timeout`.
  pub(crate) fn recv_timeout_sync(&self, timeout: Duration) -> Result<T, RecvErrorTimeout> {
    let start_time = Instant::now();
    loop {
      let mut guard = self.shared.internal.lock();
      if let Some(value) = guard.buffer.pop_front() {
        return Ok(value);
      }
      if guard.closed {
        return Err(RecvErrorTimeout::Disconnected);
      }

      let elapsed = start_time.elapsed();
      if elapsed >= timeout {
        // A stale waiter would let a rendezvous producer hand off to nobody.
        guard.consumer_waiter = None;
        return Err(RecvErrorTimeout::Timeout);
      }

      guard.consumer_waiter = Some(Waiter::Sync(thread::current()));
      drop(guard);
      thread::park_timeout(timeout - elapsed);
    }
  }

  /// Receives a value asynchronously.
  pub(crate) fn recv_async(&self) -> RecvFuture<'_, T> {
    RecvFuture {
      consumer: self,
      registered: false,
    }
  }

  /// Polls for a value, registering the task's waker if the mailbox is empty.
  pub(crate) fn poll_recv(&self, cx: &mut Context<'_>) -> Poll<Result<T, RecvError>> {
    let mut guard = self.shared.internal.lock();

    if let Some(value) = guard.buffer.pop_front() {
      return Poll::Ready(Ok(value));
    }
    if guard.closed {
      return Poll::Ready(Err(RecvError::Disconnected));
    }

    match &guard.consumer_waiter {
      Some(Waiter::Async(existing)) if existing.will_wake(cx.waker()) => {}
      _ => guard.consumer_waiter = Some(Waiter::Async(cx.waker().clone())),
    }
    Poll::Pending
  }

  /// Closes the mailbox from the receiving side. Buffered values stay readable.
  pub(crate) fn close(&self) -> bool {
    self.shared.internal.lock().close()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.shared.internal.lock().closed
  }

  pub(crate) fn len(&self) -> usize {
    self.shared.internal.lock().buffer.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.shared.internal.lock().buffer.is_empty()
  }

  pub(crate) fn capacity(&self) -> usize {
    self.shared.internal.lock().capacity
  }

  pub(crate) fn dropped_count(&self) -> u64 {
    self.shared.internal.lock().dropped_count
  }

  fn clear_async_waiter(&self) {
    let mut guard = self.shared.internal.lock();
    if matches!(guard.consumer_waiter, Some(Waiter::Async(_))) {
      guard.consumer_waiter = None;
    }
  }
}

impl<T> Drop for MailboxConsumer<T> {
  fn drop(&mut self) {
    let discarded = {
      let mut guard = self.shared.internal.lock();
      guard.close();
      mem::take(&mut guard.buffer)
    };
    // Values are dropped outside the lock.
    drop(discarded);
  }
}

// --- Future Implementation ---

#[must_use = "futures do nothing unless you .await or poll them"]
pub(crate) struct RecvFuture<'a, T> {
  consumer: &'a MailboxConsumer<T>,
  registered: bool,
}

impl<'a, T> Future for RecvFuture<'a, T> {
  type Output = Result<T, RecvError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    let poll = this.consumer.poll_recv(cx);
    this.registered = poll.is_pending();
    poll
  }
}

impl<'a, T> Drop for RecvFuture<'a, T> {
  fn drop(&mut self) {
    // An abandoned future (e.g. the losing arm of a `select!`) must not leave
    // a waker behind, or a rendezvous mailbox would keep accepting values.
    if self.registered {
      self.consumer.clear_async_waiter();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::timeout;

  const TEST_TIMEOUT: Duration = Duration::from_millis(500);

  #[test]
  fn try_recv_empty_and_after_deliver() {
    let (producer, consumer) = channel::<i32>(5);
    assert_eq!(consumer.try_recv(), Err(TryRecvError::Empty));

    producer.try_deliver(100).unwrap();
    assert_eq!(consumer.try_recv().unwrap(), 100);
    assert_eq!(consumer.try_recv(), Err(TryRecvError::Empty));
  }

  #[test]
  fn deliver_drops_when_full() {
    let (producer, consumer) = channel::<i32>(2);

    producer.try_deliver(1).unwrap();
    producer.try_deliver(2).unwrap();
    assert_eq!(consumer.dropped_count(), 0);

    assert_eq!(producer.try_deliver(3), Err(DeliverError::Full(3)));
    assert_eq!(producer.try_deliver(4), Err(DeliverError::Full(4)));
    assert_eq!(consumer.dropped_count(), 2);
    assert_eq!(consumer.len(), 2);

    assert_eq!(consumer.try_recv().unwrap(), 1);
    assert_eq!(consumer.try_recv().unwrap(), 2);
    assert_eq!(consumer.try_recv(), Err(TryRecvError::Empty));
  }

  #[test]
  fn close_keeps_buffered_values_then_disconnects() {
    let (producer, consumer) = channel::<i32>(5);
    producer.try_deliver(1).unwrap();
    producer.try_deliver(2).unwrap();

    assert!(producer.close());
    assert!(!producer.close(), "second close must be a no-op");
    assert_eq!(producer.try_deliver(3), Err(DeliverError::Closed(3)));

    assert_eq!(consumer.recv_sync().unwrap(), 1);
    assert_eq!(consumer.recv_sync().unwrap(), 2);
    assert_eq!(consumer.recv_sync(), Err(RecvError::Disconnected));
  }

  #[test]
  fn producer_drop_disconnects() {
    let (producer, consumer) = channel::<i32>(5);
    drop(producer);
    assert_eq!(consumer.try_recv(), Err(TryRecvError::Disconnected));
  }

  #[test]
  fn consumer_drop_rejects_further_deliveries() {
    let (producer, consumer) = channel::<i32>(5);
    producer.try_deliver(1).unwrap();
    drop(consumer);

    assert_eq!(producer.try_deliver(2), Err(DeliverError::Closed(2)));
    assert_eq!(producer.dropped_count(), 0);
  }

  #[test]
  fn rendezvous_rejects_without_waiting_consumer() {
    let (producer, consumer) = channel::<i32>(0);
    assert_eq!(producer.try_deliver(1), Err(DeliverError::Full(1)));
    assert_eq!(consumer.try_recv(), Err(TryRecvError::Empty));
  }

  #[test]
  fn rendezvous_hands_off_to_parked_consumer() {
    let (producer, consumer) = channel::<i32>(0);

    let handle = thread::spawn(move || {
      let received = consumer.recv_sync();
      (received, consumer)
    });

    // Retry until the consumer has parked; only then is there room.
    let deadline = Instant::now() + TEST_TIMEOUT;
    loop {
      match producer.try_deliver(7) {
        Ok(()) => break,
        Err(DeliverError::Full(_)) if Instant::now() < deadline => {
          thread::sleep(Duration::from_millis(1))
        }
        Err(e) => panic!("consumer never parked: {:?}", e),
      }
    }

    let (received, _consumer) = handle.join().expect("Thread panicked");
    assert_eq!(received, Ok(7));
    // The waiter was consumed by the hand-off.
    assert_eq!(producer.try_deliver(8), Err(DeliverError::Full(8)));
  }

  #[test]
  fn recv_timeout_expires_and_clears_waiter() {
    let (producer, consumer) = channel::<i32>(0);
    assert_eq!(
      consumer.recv_timeout_sync(Duration::from_millis(20)),
      Err(RecvErrorTimeout::Timeout)
    );
    assert_eq!(producer.try_deliver(1), Err(DeliverError::Full(1)));
  }

  #[test]
  fn recv_sync_blocks_and_unblocks() {
    let (producer, consumer) = channel(1);

    let handle = thread::spawn(move || consumer.recv_sync());

    thread::sleep(Duration::from_millis(100));
    producer.try_deliver(99).unwrap();

    let result = handle.join().expect("Thread panicked");
    assert_eq!(result.unwrap(), 99);
  }

  #[tokio::test]
  async fn recv_async_waits_and_completes() {
    let (producer, consumer) = channel(1);

    let task = tokio::spawn(async move { consumer.recv_async().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    producer.try_deliver(123).unwrap();

    let result = timeout(TEST_TIMEOUT, task)
      .await
      .expect("Task timed out")
      .unwrap();
    assert_eq!(result.unwrap(), 123);
  }

  #[tokio::test]
  async fn async_recv_wakes_on_close() {
    let (producer, consumer) = channel::<()>(1);

    let task = tokio::spawn(async move { consumer.recv_async().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    producer.close();

    let result = timeout(TEST_TIMEOUT, task)
      .await
      .expect("Task timed out")
      .unwrap();
    assert_eq!(result, Err(RecvError::Disconnected));
  }

  #[tokio::test]
  async fn abandoned_future_unregisters_waker() {
    let (producer, consumer) = channel::<i32>(0);

    // The future pends once, then is dropped by the timeout.
    let res = timeout(Duration::from_millis(20), consumer.recv_async()).await;
    assert!(res.is_err());

    assert_eq!(producer.try_deliver(1), Err(DeliverError::Full(1)));
  }

  #[test]
  fn concurrent_delivery() {
    let (producer, consumer) = channel(100);
    let producer = Arc::new(producer);
    let mut handles = Vec::new();

    for i in 0..10 {
      let producer = Arc::clone(&producer);
      handles.push(thread::spawn(move || {
        for j in 0..10 {
          producer.try_deliver(i * 10 + j).unwrap();
        }
      }));
    }

    for handle in handles {
      handle.join().unwrap();
    }

    let mut received_count = 0;
    while consumer.try_recv().is_ok() {
      received_count += 1;
    }

    assert_eq!(received_count, 100);
    assert_eq!(consumer.dropped_count(), 0);
  }
}
