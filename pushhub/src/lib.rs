//! The realtime push channel (§4.E): a per-user authenticated WebSocket
//! fan-out for generation progress/terminal events and token-balance
//! updates.
//!
//! Connection bookkeeping is grounded on `host/src/server/auth.rs`'s
//! `DashMap`-backed connection table; the socket pump is grounded on
//! `reqactor/src/backend.rs`'s read/write task split. This crate knows
//! nothing about HTTP routing beyond the `axum` WebSocket extractor type —
//! composing it into a router, and supplying a real `SocketAuthenticator`,
//! is `imagegen-host`'s job.

mod error;
mod event;
mod hub;
mod ratelimit;
mod socket;

pub use error::{PushHubError, PushHubResult};
pub use event::{GenerationResult, ImageSummary, PushEvent};
pub use hub::{PushHub, SocketId};
pub use socket::{handle_socket, SocketAuthenticator};
