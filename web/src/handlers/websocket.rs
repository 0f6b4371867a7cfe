//! WebSocket endpoint for live updates.
//!
//! The connection is one-way: the server pushes every live-update payload
//! as a text frame, verbatim. Frames from the client are read only to
//! notice when it goes away.

use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tracing::{debug, info};

/// Upgrade the request and register the connection with the live bridge.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get};
/// use event_notify_web::handlers::websocket;
///
/// let app = Router::new()
///     .route("/ws", get(websocket::handle))
///     .with_state(state);
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    debug!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection until either side ends it.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut connection = state.registry.register().await;
    let id = connection.id();

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = connection.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        debug!(connection_id = %id, "WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => {
                    info!(connection_id = %id, "Client requested close");
                    break;
                }
                // Axum answers pings; nothing else is expected from clients.
                Message::Text(_) | Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        debug!(connection_id = %id, "WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            send_task.abort();
        },
    }

    state.registry.unregister(id).await;
}
