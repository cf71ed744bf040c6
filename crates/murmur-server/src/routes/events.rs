//! The progress push subscription: a long-lived WebSocket per client.
//!
//! The server forwards every ledger broadcast (`job_created` full
//! records, `job_update` deltas) as JSON text frames. Delivery is
//! best-effort: a disconnected client simply misses events and resyncs
//! through the job list on reconnect; nothing is replayed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::state::AppState;

/// GET /api/events — upgrades to WebSocket.
pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Progress subscriber connected");

    let mut rx = state.ledger.subscribe();
    let (mut sink, mut stream) = socket.split();

    // Sender task: forward ledger events to the socket.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to serialize job event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        tracing::debug!(conn_id = %sender_conn_id, "Subscriber sink closed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Missed deltas are gone for good; the client's poller
                    // corrects the gap on its next snapshot.
                    tracing::warn!(conn_id = %sender_conn_id, missed = n, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Receiver loop: subscribers send nothing meaningful; just track the
    // close handshake.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Subscriber receive error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Progress subscriber disconnected");
}
