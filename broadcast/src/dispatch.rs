// src/dispatch.rs

//! The dispatch engine: decides, for one dequeued message, what each
//! registered listener receives.
//!
//! ## Rules
//! - A message's `synchronize` flag opens the gate of every listener it
//!   addresses directly (all listeners for a broadcast, only the target for
//!   the targeted shapes) *before* delivery is attempted.
//! - An unsynchronized listener receives nothing. Skips are not errors.
//! - Delivery never blocks: a full listener queue drops the value for that
//!   listener only.
//! - A listener whose handle was dropped is pruned from the registry.

use crate::error::DeliverError;
use crate::listener::ListenerId;
use crate::message::Dispatch;
use crate::registry::{ListenerState, Registry};

use std::fmt;
use tracing::{debug, error, trace};

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
  Delivered,
  /// The listener is not synchronized yet.
  Skipped,
  /// The listener's queue was full.
  Dropped,
  /// The listener's handle is gone.
  Detached,
}

/// Applies `msg` to the registry.
pub(crate) fn dispatch<T>(registry: &mut Registry<T>, msg: Dispatch<T>)
where
  T: Clone + fmt::Debug,
{
  let mut detached = Vec::new();

  match msg {
    Dispatch::ForAll { value, synchronize } => {
      for state in registry.iter_mut() {
        if synchronize {
          state.synchronize();
        }
        if push(value.clone(), state) == Delivery::Detached {
          detached.push(state.id);
        }
      }
    }
    Dispatch::ForListener {
      id,
      value,
      synchronize,
    } => {
      if let Some(state) = registry.get_mut(id) {
        if synchronize {
          state.synchronize();
        }
        if push(value, state) == Delivery::Detached {
          detached.push(id);
        }
      }
    }
    Dispatch::ForListenerAndEveryoneElse {
      id,
      value,
      value_else,
      synchronize,
    } => {
      for state in registry.iter_mut() {
        let v = if state.id == id {
          if synchronize {
            state.synchronize();
          }
          value.clone()
        } else {
          value_else.clone()
        };
        if push(v, state) == Delivery::Detached {
          detached.push(state.id);
        }
      }
    }
  }

  prune(registry, detached);
}

/// Attempts a non-blocking delivery of `value` to one listener.
pub(crate) fn push<T: fmt::Debug>(value: T, state: &ListenerState<T>) -> Delivery {
  // Checked ahead of the gate so gated listeners are pruned too.
  if state.queue.is_closed() {
    return Delivery::Detached;
  }
  if !state.synchronized {
    trace!(listener_id = %state.id, value = ?value, "skip: listener not synchronized");
    return Delivery::Skipped;
  }

  match state.queue.try_deliver(value) {
    Ok(()) => Delivery::Delivered,
    Err(DeliverError::Full(value)) => {
      error!(listener_id = %state.id, value = ?value, "unable to send: listener queue full");
      Delivery::Dropped
    }
    Err(DeliverError::Closed(_)) => Delivery::Detached,
  }
}

pub(crate) fn prune<T>(registry: &mut Registry<T>, detached: Vec<ListenerId>) {
  for id in detached {
    if registry.remove(id).is_some() {
      debug!(listener_id = %id, "listener handle dropped, removed listener");
    }
  }
}
