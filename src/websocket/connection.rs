use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ConnectionId, ServerMessage};
use crate::server::SyncServer;

/// Bound on the per-connection send queue. The room serialiser enqueues and
/// moves on; a consumer this far behind starts losing broadcasts.
const SEND_QUEUE_CAPACITY: usize = 256;

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<SyncServer>, addr: SocketAddr) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(SEND_QUEUE_CAPACITY);

    let connection_id = server.register_client(tx, addr);

    // Outgoing half: drain the send queue into the socket. The queue closes
    // once the connection is unregistered and its membership reaped.
    let server_for_send = server.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if send_server_message(&mut sink, &message, &connection_id)
                .await
                .is_err()
            {
                break;
            }
        }
        // Write failure or queue closed; either way the connection is done
        server_for_send.unregister_client(&connection_id).await;
    });

    // Incoming half: per-connection order is preserved by handling each
    // frame to completion before reading the next.
    let max_frame = server.config().server.max_message_size;
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "WebSocket transport error");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                if text.len() > max_frame {
                    tracing::warn!(
                        %connection_id,
                        size = text.len(),
                        max = max_frame,
                        "Dropped oversized frame"
                    );
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(message) => {
                        server.handle_client_message(&connection_id, message).await;
                    }
                    Err(e) => {
                        // Malformed frames are dropped, not answered
                        tracing::debug!(%connection_id, error = %e, "Dropped malformed frame");
                    }
                }
            }
            Message::Binary(_) => {
                tracing::debug!(%connection_id, "Dropped unexpected binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    // Transport close enqueues a synthetic leave for the membership
    server.unregister_client(&connection_id).await;
    // The send task drains and exits on its own once the queue closes
    drop(send_task);
}

async fn send_server_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
    connection_id: &ConnectionId,
) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(%connection_id, error = %e, "Failed to serialize server message");
            return Ok(());
        }
    };

    if sink.send(Message::Text(json.into())).await.is_err() {
        tracing::debug!(%connection_id, "Failed to send message, connection closed");
        return Err(());
    }

    Ok(())
}
