//! The realtime push route (§6): upgrades to a WebSocket and hands it
//! straight to `imagegen_pushhub::handle_socket`, which owns
//! authentication and the event pump from there.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// The handshake bearer token, carried as `?auth.token=...` since
    /// browser WebSocket clients can't set an `Authorization` header.
    #[serde(rename = "auth.token")]
    pub auth_token: Option<String>,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        imagegen_pushhub::handle_socket(
            socket,
            state.pushhub,
            state.socket_authenticator,
            query.auth_token,
        )
        .await
    })
}
