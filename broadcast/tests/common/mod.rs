#![allow(dead_code)]

use fibre_broadcast::Listener;
use std::time::Duration;
use tokio::time::timeout;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(50);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const WRITE_INTERVAL: Duration = Duration::from_millis(2);
pub const ITEMS_LOW: usize = 10;
pub const ITEMS_HIGH: usize = 10_000;

/// Routes `tracing` output to the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Receives exactly `n` values, failing the test if they do not arrive in time.
pub async fn recv_n<T>(listener: &Listener<T>, n: usize) -> Vec<T> {
  let mut out = Vec::with_capacity(n);
  for _ in 0..n {
    let value = timeout(LONG_TIMEOUT, listener.recv())
      .await
      .expect("value did not arrive in time")
      .expect("listener closed early");
    out.push(value);
  }
  out
}

/// Asserts that nothing arrives on `listener` within `d`.
pub async fn assert_silent<T: std::fmt::Debug>(listener: &Listener<T>, d: Duration) {
  if let Ok(res) = timeout(d, listener.recv()).await {
    panic!("listener {} unexpectedly received {:?}", listener.id(), res);
  }
}
