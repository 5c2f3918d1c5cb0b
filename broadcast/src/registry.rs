// src/registry.rs

//! Listener registry owned by the event loop.
//!
//! Only the event loop touches the registry, so it needs no synchronization.
//! Iteration follows listener id order.

use crate::listener::ListenerId;
use crate::mailbox::MailboxProducer;

use std::collections::BTreeMap;

/// Per-listener delivery state.
#[derive(Debug)]
pub(crate) struct ListenerState<T> {
  pub(crate) id: ListenerId,
  /// Gate for deliveries. Only ever flips from `false` to `true`.
  pub(crate) synchronized: bool,
  pub(crate) queue: MailboxProducer<T>,
}

impl<T> ListenerState<T> {
  pub(crate) fn new(id: ListenerId, synchronized: bool, queue: MailboxProducer<T>) -> Self {
    Self {
      id,
      synchronized,
      queue,
    }
  }

  #[inline]
  pub(crate) fn synchronize(&mut self) {
    self.synchronized = true;
  }
}

#[derive(Debug)]
pub(crate) struct Registry<T> {
  listeners: BTreeMap<ListenerId, ListenerState<T>>,
}

impl<T> Registry<T> {
  pub(crate) fn new() -> Self {
    Self {
      listeners: BTreeMap::new(),
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.listeners.len()
  }

  /// Registers a listener. Ids are never reused, so an existing entry is a
  /// caller bug; the old entry is returned (and its queue closed on drop).
  pub(crate) fn insert(&mut self, state: ListenerState<T>) -> Option<ListenerState<T>> {
    self.listeners.insert(state.id, state)
  }

  pub(crate) fn get_mut(&mut self, id: ListenerId) -> Option<&mut ListenerState<T>> {
    self.listeners.get_mut(&id)
  }

  pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ListenerState<T>> {
    self.listeners.values_mut()
  }

  /// Ids of listeners whose queue is already closed, typically because the
  /// handle was dropped.
  pub(crate) fn closed_ids(&self) -> Vec<ListenerId> {
    self
      .listeners
      .values()
      .filter(|state| state.queue.is_closed())
      .map(|state| state.id)
      .collect()
  }

  /// Removes a listener and closes its queue.
  pub(crate) fn remove(&mut self, id: ListenerId) -> Option<ListenerState<T>> {
    let state = self.listeners.remove(&id)?;
    state.queue.close();
    Some(state)
  }

  /// Removes every listener, closing their queues. Returns the removed ids.
  pub(crate) fn remove_all(&mut self) -> Vec<ListenerId> {
    let listeners = std::mem::take(&mut self.listeners);
    listeners
      .into_values()
      .map(|state| {
        state.queue.close();
        state.id
      })
      .collect()
  }
}
