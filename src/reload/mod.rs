//! Live reload over a WebSocket.
//!
//! # Architecture
//!
//! ```text
//! browser ◄──► socket pump (thread) ──► Session (tokio task) ◄── watchers
//!                    ▲                        │                 ◄── debounce
//!                    └──── outbound queue ◄───┘
//! ```
//!
//! # Modules
//!
//! - `server` - listener and acceptor thread
//! - `socket` - handshake and frame pump
//! - `session` - per-socket state machine
//! - `message` - JSON protocol
//! - `deps` - files a page depends on
//! - `watch` - file watch backends
//! - `debounce` - cancellable one-shot timer

pub mod debounce;
pub mod deps;
pub mod message;
pub mod server;
pub mod session;
pub mod socket;
pub mod watch;

pub use server::ReloadServer;
