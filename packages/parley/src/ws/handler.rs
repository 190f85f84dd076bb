//! WebSocket Handler
//!
//! Bridges one upgraded socket to a hub session: a writer task drains the
//! connection's outbound queue into the socket, and the socket's text frames
//! feed the session driver.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chat_hub::{ChatHub, Identity, Outbound, run_session};
use futures::{future, sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::metrics::ServerMetrics;

/// Handle one chat connection for `identity` until it closes.
pub async fn handle_chat_ws(
    socket: WebSocket,
    identity: Identity,
    hub: Arc<ChatHub>,
    metrics: Arc<ServerMetrics>,
) {
    let (handle, mut outbound) = hub.open_connection();
    let conn_id = handle.id();
    info!(identity = %identity, conn_id = %conn_id, "New chat WebSocket connection");
    metrics.connection_opened();

    let (mut ws_sender, ws_receiver) = socket.split();

    // Ends when the hub drops the handle (release, eviction, shutdown) and
    // the queue is drained, or right after a close frame.
    let writer_metrics = metrics.clone();
    let writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            match item {
                Outbound::Envelope(envelope) => {
                    let json = match envelope.to_json() {
                        Ok(j) => j,
                        Err(e) => {
                            error!(conn_id = %conn_id, "Failed to serialize envelope: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        writer_metrics.websocket_error();
                        break;
                    }
                    writer_metrics.frame_sent();
                }
                Outbound::Close { code, reason } => {
                    debug!(conn_id = %conn_id, code = code, reason = %reason, "Sending close frame");
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    let _ = ws_sender.send(Message::Close(Some(frame))).await;
                    return;
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    let reader_metrics = metrics.clone();
    let inbound = ws_receiver
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(move |msg| {
            let metrics = reader_metrics.clone();
            async move {
                match msg {
                    Ok(Message::Text(text)) => {
                        metrics.frame_received();
                        Some(Ok(text.as_str().to_owned()))
                    }
                    Ok(Message::Binary(_)) => {
                        debug!(conn_id = %conn_id, "Ignoring binary frame");
                        None
                    }
                    // Ping/pong are answered by the transport
                    Ok(_) => None,
                    Err(e) => {
                        metrics.websocket_error();
                        Some(Err(e))
                    }
                }
            }
        });

    let end = run_session(&hub, identity.clone(), handle, Box::pin(inbound)).await;

    if let Err(e) = writer.await {
        error!(conn_id = %conn_id, "Writer task failed: {}", e);
    }

    metrics.connection_closed();
    info!(identity = %identity, conn_id = %conn_id, end = ?end, "Chat WebSocket connection closed");
}
