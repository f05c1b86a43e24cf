//! `WebSocket` handler for the push stream.
//!
//! Clients connect to `GET /ws`. On connect they receive one event per
//! channel that already has data, then one event per accepted submission
//! for as long as they stay connected. The stream is one-way: client text
//! and binary frames are ignored.
//!
//! The socket task drains the session's outbound queue; the hub only ever
//! enqueues. A client that cannot keep up loses frames instead of
//! stalling ingestion.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::lifecycle::ObserverSession;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming channel events.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_observe(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Drive one observer from accept to close.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let lifecycle = &state.lifecycle;
    let mut session = lifecycle.connect();

    if let Err(e) = lifecycle.open(&mut session).await {
        warn!(connection = %session.id(), error = %e, "Failed to open observer");
        lifecycle.close(&mut session).await;
        return;
    }

    let reason = pump(&mut socket, &mut session).await;
    lifecycle.close(&mut session).await;
    debug!(connection = %session.id(), reason, "WebSocket client disconnected");
}

/// Forward queued frames to the socket until either side goes away.
///
/// Returns a short description of why the loop ended.
async fn pump(socket: &mut WebSocket, session: &mut ObserverSession) -> &'static str {
    loop {
        tokio::select! {
            frame = session.next_frame() => {
                let Some(frame) = frame else {
                    return "evicted from live set";
                };
                if socket.send(Message::Text(frame)).await.is_err() {
                    return "send failed";
                }
            }
            msg = socket.recv() => {
                let reply = match msg {
                    Some(Ok(Message::Close(_))) | None => return "closed by client",
                    Some(Ok(Message::Ping(data))) => Message::Pong(data),
                    Some(Err(e)) => {
                        debug!(connection = %session.id(), error = %e, "WebSocket error");
                        return "transport error";
                    }
                    // Text, binary, and pong frames are ignored.
                    Some(Ok(_)) => continue,
                };
                if socket.send(reply).await.is_err() {
                    return "pong failed";
                }
            }
        }
    }
}
