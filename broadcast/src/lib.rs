//! A single-producer, multi-listener broadcaster for Rust.
//!
//! `fibre_broadcast` fans values out from one logical producer to a dynamic
//! set of listeners that join and leave at any time. Each listener has its own
//! bounded queue, so a slow or absent consumer loses values instead of
//! stalling the producer or the other listeners.
//!
//! ## Architecture
//! ```text
//!   Writer::write*()  ──try──► [producer queue] ─┐
//!   (never blocks, drops       (bounded)         │
//!    when full)                                  ▼
//!                                     ┌─────────────────────┐
//!   add/remove/close ──► [control] ──►│     event loop      │◄── lifetime token
//!   (waits for ack)                   │  (owns the registry)│
//!                                     └──────────┬──────────┘
//!                                  ┌─────────────┼─────────────┐
//!                                  ▼             ▼             ▼
//!                              [queue 1]     [queue 2]     [queue N]
//!                              Listener      Listener      Listener
//! ```
//!
//! - **Three addressing modes**: everyone, one listener, or one listener plus
//!   a different value for everyone else ([`Writer`]).
//! - **Synchronization gate**: a listener added unsynchronized receives
//!   nothing until a write carrying `synchronize = true` addresses it.
//! - **Linearized membership**: once `add_listener` returns, the listener sees
//!   every later dispatch and nothing earlier.
//! - **Lossy delivery**: full queues drop values and report them through
//!   `tracing`. No error ever reaches the producer.
//!
//! ## Example
//! ```rust
//! use fibre_broadcast::{BroadcastConfig, Broadcaster, Writer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!   let lifetime = CancellationToken::new();
//!   let config = BroadcastConfig::new("events").with_capacity(16).with_listener_capacity(16);
//!   let broadcaster = Broadcaster::<u32>::new(config, lifetime);
//!
//!   let listener = broadcaster.add_synced_listener().await.unwrap();
//!   broadcaster.write(42, false);
//!   assert_eq!(listener.recv().await, Ok(42));
//!
//!   broadcaster.close().await;
//!   assert!(listener.recv().await.is_err()); // end-of-stream
//! }
//! ```

pub mod config;
pub mod error;

mod actor;
mod broadcaster;
mod dispatch;
mod listener;
mod mailbox;
mod message;
mod registry;
mod writer;

pub use broadcaster::Broadcaster;
pub use config::BroadcastConfig;
pub use error::{BroadcastError, RecvError, RecvErrorTimeout, Result, TryRecvError};
pub use listener::{Listener, ListenerId};
pub use writer::Writer;
