//! Drives one upgraded WebSocket through its lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::frame::Frame;
use crate::registry::Connection;
use crate::router::MessageRouter;

/// Handshake, then read frames until the peer goes away.
///
/// Outbound traffic goes through the connection's bounded queue, drained by a
/// writer task, so a slow client never blocks delivery to anyone else.
pub async fn serve_connection(
    socket: WebSocket,
    query: HashMap<String, String>,
    router: Arc<MessageRouter>,
    queue_capacity: usize,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection, mut rx) = Connection::channel(queue_capacity);
    let connection = Arc::new(connection);

    if let Err(e) = router.handshake(&query, Arc::clone(&connection)) {
        while let Ok(text) = rx.try_recv() {
            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                return;
            }
        }
        let close = CloseFrame {
            code: close_code::INVALID,
            reason: e.to_string().into(),
        };
        let _ = ws_tx.send(WsMessage::Close(Some(close))).await;
        return;
    }

    let writer_id = connection.id();
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                debug!(connection_id = %writer_id, "Socket write failed, stopping writer");
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            WsMessage::Text(text) => router.handle_text(&connection, text.as_str()).await,
            WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => router.handle_text(&connection, text).await,
                Err(_) => {
                    let reply = Frame::error(None, "binary frame is not valid UTF-8");
                    connection.send(reply.to_text());
                }
            },
            WsMessage::Close(_) => break,
            // axum answers pings itself
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }

    router.disconnect(connection.id());
    writer.abort();
    info!(connection_id = %connection.id(), "WebSocket closed");
}
