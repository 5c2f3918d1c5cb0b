// src/writer.rs

use crate::listener::ListenerId;

/// The producer-facing side of a broadcaster.
///
/// Every method is non-blocking and failure-silent: the message is placed on
/// the bounded producer queue, or dropped (and reported through `tracing`)
/// when the queue is full or the broadcaster has shut down.
///
/// The `synchronize` flag opens the gate of the listener(s) a call addresses,
/// on that very call, so a listener added unsynchronized starts receiving
/// exactly from a point the producer chooses.
pub trait Writer<T> {
  /// Delivers `value` to every listener.
  ///
  /// With `synchronize` set, every listener becomes synchronized first.
  fn write(&self, value: T, synchronize: bool);

  /// Delivers `value` only to listener `id`. Unknown ids are ignored.
  fn write_for_listener(&self, id: ListenerId, value: T, synchronize: bool);

  /// Delivers `value` to listener `id` and `value_else` to every other listener.
  ///
  /// `synchronize` applies to listener `id` only.
  fn write_for_listener_and_everyone_else(
    &self,
    id: ListenerId,
    value: T,
    value_else: T,
    synchronize: bool,
  );
}
