pub mod handlers;
mod room;
mod student;
mod teacher;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut rx) = state.connect().await;
    tracing::info!("WebSocket connected: {}", connection);

    // Everything bound for this client goes through the hub channel. The
    // channel closes when the hub drops the connection (kick, disconnect).
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("Failed to serialize server message: {}", e),
            }
        }
        let _ = sender.close().await;
    });

    let recv_state = state.clone();
    let recv_connection = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received message from {}: {}", recv_connection, text);

                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            handlers::handle_message(&recv_connection, client_msg, &recv_state)
                                .await
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse client message: {}", e);
                            Some(ServerMessage::Error {
                                code: "PARSE_ERROR".to_string(),
                                msg: format!("Invalid message format: {}", e),
                            })
                        }
                    };

                    if let Some(reply) = reply {
                        recv_state.send_to(&recv_connection, reply).await;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("WebSocket closed by client {}", recv_connection);
                    break;
                }
                // Pings are answered by the socket itself
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("WebSocket error on {}: {}", recv_connection, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    handlers::handle_disconnect(&connection, &state).await;
    tracing::info!("WebSocket connection closed: {}", connection);
}
