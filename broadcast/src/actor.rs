// src/actor.rs

//! # The broadcaster's event loop.
//!
//! A single task owns the listener registry and multiplexes three sources:
//!
//! ```text
//! lifetime.cancelled() ──► shutdown
//! producer queue ────────► dispatch::dispatch(registry, msg)
//! control queue ─────────► AddListener / RemoveListener / Close ─► ack
//! ```
//!
//! ## Rules
//! - Sources are served one at a time; `select!` picks among the ready ones
//!   fairly. Everything the registry sees is therefore totally ordered.
//! - A control request is acknowledged only after it has been applied, so a
//!   caller whose `add_listener` returned sees every later dispatch.
//! - Shutdown (close request, cancellation, or every handle dropped) closes
//!   all listener queues, then both inbound queues, and ends the loop.
//!   Messages still queued at that point are lost.

use crate::dispatch;
use crate::error::RecvError;
use crate::listener::ListenerId;
use crate::mailbox::MailboxConsumer;
use crate::message::{Control, Dispatch};
use crate::registry::{ListenerState, Registry};

use std::fmt;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub(crate) struct BroadcastActor<T> {
  registry: Registry<T>,
  data: MailboxConsumer<Dispatch<T>>,
  control: mpsc::Receiver<Control<T>>,
  lifetime: CancellationToken,
}

impl<T> BroadcastActor<T>
where
  T: Clone + fmt::Debug,
{
  pub(crate) fn new(
    data: MailboxConsumer<Dispatch<T>>,
    control: mpsc::Receiver<Control<T>>,
    lifetime: CancellationToken,
  ) -> Self {
    Self {
      registry: Registry::new(),
      data,
      control,
      lifetime,
    }
  }

  /// Runs until shutdown.
  pub(crate) async fn run(mut self) {
    loop {
      let flow = tokio::select! {
        _ = self.lifetime.cancelled() => {
          warn!("lifetime cancelled, shutting down");
          self.shutdown();
          ControlFlow::Break(())
        }
        msg = self.data.recv_async() => match msg {
          Ok(msg) => {
            dispatch::dispatch(&mut self.registry, msg);
            ControlFlow::Continue(())
          }
          Err(RecvError::Disconnected) => {
            debug!("producer queue closed");
            self.shutdown();
            ControlFlow::Break(())
          }
        },
        req = self.control.recv() => match req {
          Some(req) => self.handle_control(req),
          None => {
            debug!("control queue closed");
            self.shutdown();
            ControlFlow::Break(())
          }
        },
      };

      if flow.is_break() {
        break;
      }
    }

    debug!("event loop exited");
  }

  fn handle_control(&mut self, req: Control<T>) -> ControlFlow<()> {
    match req {
      Control::AddListener {
        id,
        queue,
        synchronized,
        ack,
      } => {
        debug!(listener_id = %id, synchronized, "add listener");
        // Listeners no write ever reaches would otherwise linger after their
        // handle is gone.
        let detached = self.registry.closed_ids();
        dispatch::prune(&mut self.registry, detached);
        if self
          .registry
          .insert(ListenerState::new(id, synchronized, queue))
          .is_some()
        {
          error!(listener_id = %id, "listener id reused, previous listener replaced");
        }
        let _ = ack.send(());
        ControlFlow::Continue(())
      }
      Control::RemoveListener { id, ack } => {
        self.remove_listener(id);
        let _ = ack.send(());
        ControlFlow::Continue(())
      }
      Control::Close { ack } => {
        self.shutdown();
        let _ = ack.send(());
        ControlFlow::Break(())
      }
    }
  }

  fn remove_listener(&mut self, id: ListenerId) {
    if self.registry.remove(id).is_some() {
      debug!(listener_id = %id, listeners = self.registry.len(), "remove listener");
    } else {
      error!(listener_id = %id, "listener not found");
    }
  }

  fn shutdown(&mut self) {
    for id in self.registry.remove_all() {
      debug!(listener_id = %id, "remove listener");
    }
    self.data.close();
    // Requests still queued are dropped with the receiver; their callers
    // observe a dropped acknowledgment and treat the broadcaster as closed.
    self.control.close();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::TryRecvError;
  use crate::mailbox;
  use crate::message::request;
  use std::time::Duration;
  use tokio::time::timeout;

  const TEST_TIMEOUT: Duration = Duration::from_millis(500);

  struct Harness {
    data: mailbox::MailboxProducer<Dispatch<u32>>,
    control: mpsc::Sender<Control<u32>>,
    lifetime: CancellationToken,
    task: tokio::task::JoinHandle<()>,
  }

  fn start(capacity: usize) -> Harness {
    let (data, data_rx) = mailbox::channel(capacity);
    let (control, control_rx) = mpsc::channel(1);
    let lifetime = CancellationToken::new();
    let actor = BroadcastActor::new(data_rx, control_rx, lifetime.clone());
    let task = tokio::spawn(actor.run());
    Harness {
      data,
      control,
      lifetime,
      task,
    }
  }

  async fn add(h: &Harness, raw: u64, synchronized: bool) -> mailbox::MailboxConsumer<u32> {
    let (queue, rx) = mailbox::channel(8);
    let id = ListenerId::new(raw);
    request(&h.control, |ack| Control::AddListener {
      id,
      queue,
      synchronized,
      ack,
    })
    .await
    .unwrap();
    rx
  }

  #[tokio::test]
  async fn add_is_applied_before_next_dispatch() {
    let h = start(8);
    let rx = add(&h, 1, true).await;

    h.data
      .try_deliver(Dispatch::ForAll {
        value: 5,
        synchronize: false,
      })
      .unwrap();

    let got = timeout(TEST_TIMEOUT, rx.recv_async()).await.unwrap();
    assert_eq!(got, Ok(5));
  }

  #[tokio::test]
  async fn remove_unknown_is_acknowledged() {
    let h = start(8);
    let rx = add(&h, 1, true).await;

    let res = request(&h.control, |ack| Control::RemoveListener {
      id: ListenerId::new(77),
      ack,
    })
    .await;
    assert!(res.is_ok());
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
  }

  #[tokio::test]
  async fn close_request_tears_down_and_exits() {
    let h = start(8);
    let rx = add(&h, 1, true).await;

    request(&h.control, |ack| Control::Close { ack }).await.unwrap();

    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    timeout(TEST_TIMEOUT, h.task).await.unwrap().unwrap();
    assert!(h.control.is_closed());
  }

  #[tokio::test]
  async fn cancellation_tears_down_and_exits() {
    let h = start(8);
    let rx = add(&h, 1, true).await;

    h.lifetime.cancel();
    timeout(TEST_TIMEOUT, h.task).await.unwrap().unwrap();

    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    let second = request(&h.control, |ack| Control::Close { ack }).await;
    assert!(second.is_err(), "close after exit must not hang");
  }
}
