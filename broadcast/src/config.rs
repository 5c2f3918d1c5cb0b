// src/config.rs

use serde::Deserialize;

fn default_listener_capacity() -> usize {
  1
}

fn default_name() -> String {
  "broadcaster".to_string()
}

/// Construction parameters of a [`Broadcaster`](crate::Broadcaster).
///
/// Can be built in code with the `with_*` setters or deserialized from any
/// serde format. Missing fields take their defaults. Capacities of `0` are
/// valid and make the corresponding queue a rendezvous: a value is accepted
/// only while its consumer is already waiting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastConfig {
  /// Capacity of the shared producer queue. Writes beyond it are dropped.
  #[serde(default)]
  pub capacity: usize,
  /// Capacity of every listener's delivery queue.
  #[serde(default = "default_listener_capacity")]
  pub listener_capacity: usize,
  /// Name attached to every diagnostic event of this broadcaster.
  #[serde(default = "default_name")]
  pub name: String,
}

impl Default for BroadcastConfig {
  fn default() -> Self {
    Self {
      capacity: 0,
      listener_capacity: default_listener_capacity(),
      name: default_name(),
    }
  }
}

impl BroadcastConfig {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn with_listener_capacity(mut self, listener_capacity: usize) -> Self {
    self.listener_capacity = listener_capacity;
    self
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }
}
