//! WebSocket endpoint for live sensor updates.
//!
//! Each connection registers with the Broadcast Hub and forwards whatever
//! lands in its queue. Incoming frames are ignored apart from close. The
//! connection ends when the client leaves, a send fails, or the hub prunes
//! the subscriber (its queue sender is dropped).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, info};

use super::AppState;
use crate::broadcast::{BroadcastHub, Subscription};

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_loop(socket, state.hub))
}

async fn client_loop(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    let Subscription { id, mut rx } = hub.connect();
    info!(subscriber = id, "[BroadcastHub] WebSocket client connected");

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(text) = frame else {
                    debug!(subscriber = id, "[BroadcastHub] Subscriber queue closed");
                    break;
                };
                if socket.send(Message::Text(text.to_string())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    hub.disconnect(id);
    info!(subscriber = id, "[BroadcastHub] WebSocket client disconnected");
}
