use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use oxpulse_common::types::{ClientMessage, ServerMessage};
use oxpulse_stream::registry::SubscriptionRegistry;
use std::sync::{Arc, Mutex};

/// HTTP handler that upgrades `/ws/{client_id}` to a WebSocket.
///
/// Reconnecting under an existing `client_id` replaces the old
/// connection; metric subscriptions start empty on every connect.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

/// Manage a single subscriber connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the client with the subscription registry.
///   2. Spawns a sender task that serializes and forwards pushed messages.
///   3. Dispatches inbound control messages on the current task.
///   4. Deregisters on disconnect.
async fn handle_socket(socket: WebSocket, client_id: String, state: AppState) {
    tracing::info!(client_id = %client_id, "WebSocket connected");

    let (mut rx, token) = state.registry.connect(&client_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: serialize server messages onto the WebSocket sink.
    let sender_client_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(client_id = %sender_client_id, error = %e, "Failed to serialize server message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(client_id = %sender_client_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: dispatch subscribe / unsubscribe / get_latest.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        dispatch_client_message(&state.registry, &state.buffer, &client_id, msg)
                            .await;
                    }
                    Err(e) => {
                        // Malformed control frames are logged and dropped;
                        // the connection stays open.
                        tracing::warn!(client_id = %client_id, error = %e, "Ignoring malformed client message");
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(client_id = %client_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Token-gated so a reconnect racing this teardown keeps its entry.
    state.registry.disconnect_if_current(&client_id, token).await;
    send_task.abort();
    tracing::info!(client_id = %client_id, "WebSocket disconnected");
}

async fn dispatch_client_message(
    registry: &Arc<SubscriptionRegistry>,
    buffer: &Arc<Mutex<oxpulse_buffer::MetricBuffer>>,
    client_id: &str,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Subscribe { metrics } => {
            tracing::debug!(client_id = %client_id, metrics = ?metrics, "Subscribe");
            registry.subscribe(client_id, &metrics).await;
        }
        ClientMessage::Unsubscribe { metrics } => {
            tracing::debug!(client_id = %client_id, metrics = ?metrics, "Unsubscribe");
            registry.unsubscribe(client_id, &metrics).await;
        }
        ClientMessage::GetLatest { metric_name } => {
            let value = buffer.lock().unwrap().latest_value(&metric_name);
            let reply = ServerMessage::LatestValue { metric_name, value };
            if let Err(e) = registry.send_to_client(client_id, reply).await {
                tracing::debug!(client_id = %client_id, error = %e, "Failed to answer get_latest");
            }
        }
    }
}
