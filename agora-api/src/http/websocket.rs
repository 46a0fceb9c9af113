//! WebSocket handler carrying the JSON presence protocol
//!
//! Each socket is one connection. Inbound text frames are decoded into
//! `ClientEvent`s and handed to the coordinator; the connection's mailbox is
//! drained into the socket by a writer task.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info};

use agora_presence::{ClientEvent, Delivery, ServerEvent};

use crate::http::AppState;

/// Upgrade to a WebSocket; no presence state exists until `join-conference`
pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let max_message_size = state.coordinator.config().max_ws_message_bytes;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let coordinator = state.coordinator;
    let (connection_id, mut mailbox) = coordinator.connect();

    info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Mailbox -> socket
    let writer_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(delivery) = mailbox.recv().await {
            match delivery {
                Delivery::Event(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(connection_id = %writer_id, "Failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                        debug!(connection_id = %writer_id, "Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Delivery::Close => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Socket -> coordinator
    let reader = coordinator.clone();
    let reader_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = ws_stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match ClientEvent::from_json(text.as_str()) {
                    Ok(event) => reader.handle_event(&reader_id, event),
                    Err(e) => {
                        debug!(connection_id = %reader_id, "Malformed frame: {}", e);
                        reader
                            .hub()
                            .send_to(&reader_id, ServerEvent::error(format!("Invalid event: {e}")));
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {
                    // Ping/pong are answered by axum; binary frames carry nothing here
                }
                Err(e) => {
                    debug!(connection_id = %reader_id, "WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    coordinator.disconnect(&connection_id);

    info!(connection_id = %connection_id, "WebSocket connection closed");
}
