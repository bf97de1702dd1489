//! The axum `ws` upgrade handler: bearer-token handshake auth, presence
//! events, inbound rate limiting, outbound fan-out.
//!
//! Grounded on `reqactor/src/backend.rs`'s `serve_in_background` split
//! between a task that reads a channel and one that writes a socket; here
//! the two halves are the WebSocket's own split sink/stream instead of an
//! internal mpsc pair.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use imagegen_core::UserId;

use crate::event::PushEvent;
use crate::hub::PushHub;
use crate::ratelimit::RateLimiter;

/// Verifies a handshake bearer token into the `UserId` it authenticates as.
/// Token *issuance* is out of scope here (§1 non-goal); this only checks
/// one.
#[async_trait]
pub trait SocketAuthenticator: Send + Sync {
    async fn authenticate(&self, bearer_token: &str) -> Option<UserId>;
}

const MAX_INBOUND_EVENTS_PER_SECOND: usize = 10;

/// Drives one accepted WebSocket end-to-end: authenticate, register,
/// pump outbound events, read+rate-limit inbound frames, and always
/// unregister on exit (socket close, auth failure, or send error).
pub async fn handle_socket(
    mut socket: WebSocket,
    hub: Arc<PushHub>,
    authenticator: Arc<dyn SocketAuthenticator>,
    bearer_token: Option<String>,
) {
    let Some(token) = bearer_token else {
        let _ = send_event(&mut socket, &PushEvent::Unauthorized).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let Some(user_id) = authenticator.authenticate(&token).await else {
        let _ = send_event(&mut socket, &PushEvent::Unauthorized).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let (socket_id, _was_offline, mut events_rx) = hub.register(user_id);

    let mut limiter = RateLimiter::per_second(MAX_INBOUND_EVENTS_PER_SECOND);

    loop {
        tokio::select! {
            outbound = events_rx.recv() => {
                match outbound {
                    Some(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        if !limiter.check() {
                            let _ = send_event(
                                &mut socket,
                                &PushEvent::RateLimit {
                                    code: "RATE_LIMIT",
                                    message: format!(
                                        "max {MAX_INBOUND_EVENTS_PER_SECOND} events/sec exceeded"
                                    ),
                                },
                            )
                            .await;
                        }
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    hub.unregister(user_id, socket_id);
}

async fn send_event(socket: &mut WebSocket, event: &PushEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).expect("PushEvent always serializes");
    socket.send(Message::Text(text)).await
}
