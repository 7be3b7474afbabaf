use super::state::AppState;
use crate::session::{OwnerId, ServerMessage, SessionManager};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Opaque owner identity, supplied by the authentication collaborator
    /// fronting this service
    pub owner: Option<String>,
}

/// GET /ws/capture
/// Upgrade to the persistent capture connection
pub async fn capture_ws(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let owner = OwnerId(params.owner.unwrap_or_else(|| "anonymous".to_string()));
    ws.on_upgrade(move |socket| handle_socket(socket, state, owner))
}

async fn handle_socket(socket: WebSocket, state: AppState, owner: OwnerId) {
    info!("Capture connection opened (owner={})", owner);

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Outbound messages funnel through one channel so the detached finish
    // pipeline can deliver its result after the receive loop ends.
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                debug!("Capture connection closed; stopping writer");
                break;
            }
        }
    });

    let mut manager = SessionManager::new(
        state.registry,
        state.store,
        state.pipeline,
        state.audio_defaults,
        owner,
        outbound,
    );

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => manager.handle_text(&text).await,
            Ok(Message::Binary(bytes)) => manager.handle_binary(bytes).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong handled by axum
            Err(e) => {
                debug!("Capture connection error: {}", e);
                break;
            }
        }
    }

    manager.handle_disconnect().await;
    info!("Capture connection closed");

    // The writer drains remaining messages (none once every outbound sender
    // is dropped); a still-running finish task holds its own sender clone.
    drop(manager);
    let _ = writer.await;
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
