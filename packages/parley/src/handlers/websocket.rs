use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chat_hub::Identity;
use tracing::warn;

use crate::AppState;
use crate::ws;

/// Chat WebSocket. The path segment is taken verbatim as the identity.
pub async fn chat_websocket_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match Identity::new(client_id) {
        Ok(id) => id,
        Err(e) => {
            warn!("Refusing WebSocket: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let hub = state.hub.clone();
    let metrics = state.metrics.clone();

    ws.on_upgrade(move |socket| ws::handle_chat_ws(socket, identity, hub, metrics))
}
