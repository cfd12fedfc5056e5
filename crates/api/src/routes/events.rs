//! Node-status event stream (§6: "WebSocket, one channel per Execution").

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use flowright_core::ExecutionId;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// `GET /executions/{id}/events` -- upgrades to a WebSocket that forwards
/// every `NodeStatusEvent` published for this Execution as a JSON text frame.
pub async fn node_status_stream(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_events(socket, state, id))
}

async fn forward_events(mut socket: WebSocket, state: AppState, execution_id: ExecutionId) {
    let mut receiver = state.events.subscribe(execution_id);

    loop {
        match receiver.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(payload) => {
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::error!(%execution_id, %error, "failed to serialize node status event");
                }
            },
            // The client fell behind the ring buffer; tell it to resync off
            // GET /executions/{id}/node-runs rather than replaying history.
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(%execution_id, skipped, "node status subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
