//! WebSocket server handler using Axum.

use crate::client::{ClientRegistry, ClientState, CLIENT_CHANNEL_BUFFER_SIZE};
use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::relay::StatusRelay;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub relay: Arc<StatusRelay>,
}

/// Create the WebSocket router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clients = state.registry.client_count();
    let groups = state.registry.group_count();
    format!(
        r#"{{"status":"ok","clients":{},"order_groups":{}}}"#,
        clients, groups
    )
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Split the socket into sender and receiver
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Bounded channel for outgoing messages; slow clients drop instead of
    // stalling the relay.
    let (tx, mut rx) = mpsc::channel::<Message>(CLIENT_CHANNEL_BUFFER_SIZE);

    // Create client state
    let client = Arc::new(ClientState::new(tx));
    let client_id = state.registry.register(client.clone());

    counter!("gateway_connections_total").increment(1);
    gauge!("gateway_active_connections").set(state.registry.client_count() as f64);

    info!("Client {} connected", client_id);

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Ping interval for keepalive
    let mut ping_interval = interval(Duration::from_secs(30));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Handle incoming messages
    loop {
        tokio::select! {
            biased;

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        if let Err(e) = handle_message(&state, &client, msg).await {
                            warn!("Error handling message from {}: {:?}", client_id, e);
                            let _ = client.send(&ServerMessage::Error {
                                message: e.to_string(),
                                code: "PROCESSING_ERROR".to_string(),
                            });
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {:?}", client_id, e);
                        break;
                    }
                    None => {
                        // Connection closed
                        break;
                    }
                }
            }

            // Send ping periodically
            _ = ping_interval.tick() => {
                if client.tx.try_send(Message::Ping(vec![].into())).is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup
    state.registry.unregister(&client_id);
    send_task.abort();

    counter!("gateway_disconnections_total").increment(1);
    gauge!("gateway_active_connections").set(state.registry.client_count() as f64);

    info!("Client {} disconnected", client_id);
}

/// Handle a single WebSocket message.
async fn handle_message(
    state: &Arc<AppState>,
    client: &Arc<ClientState>,
    msg: Message,
) -> Result<()> {
    match msg {
        Message::Text(text) => {
            let client_msg: ClientMessage = serde_json::from_str(&text)?;
            handle_client_message(state, client, client_msg).await
        }
        Message::Binary(data) => {
            let client_msg: ClientMessage = serde_json::from_slice(&data)?;
            handle_client_message(state, client, client_msg).await
        }
        Message::Ping(data) => {
            client.update_ping();
            let _ = client.tx.try_send(Message::Pong(data));
            Ok(())
        }
        Message::Pong(_) => {
            client.update_ping();
            Ok(())
        }
        Message::Close(_) => {
            // Will be handled by the connection loop
            Ok(())
        }
    }
}

/// Handle a parsed client message.
async fn handle_client_message(
    state: &Arc<AppState>,
    client: &Arc<ClientState>,
    msg: ClientMessage,
) -> Result<()> {
    match msg {
        ClientMessage::Subscribe { order_ids } => {
            debug!("Client {} subscribing to {:?}", client.id, order_ids);

            state.registry.subscribe(&client.id, &order_ids)?;

            // Send confirmation
            client.send(&ServerMessage::Subscribed {
                order_ids: order_ids.clone(),
            })?;

            // Current state per order, so a late subscriber is not missing
            // transitions published before it joined.
            for order_id in &order_ids {
                if let Err(e) = state.relay.send_snapshot(client, order_id).await {
                    warn!(
                        "Failed to send snapshot for {} to {}: {:?}",
                        order_id, client.id, e
                    );
                }
            }

            counter!("gateway_subscriptions_total").increment(order_ids.len() as u64);
            Ok(())
        }
        ClientMessage::Unsubscribe { order_ids } => {
            debug!("Client {} unsubscribing from {:?}", client.id, order_ids);

            state.registry.unsubscribe(&client.id, &order_ids)?;

            client.send(&ServerMessage::Unsubscribed { order_ids })?;

            Ok(())
        }
        ClientMessage::Ping => {
            client.update_ping();
            client.send(&ServerMessage::Pong)?;
            Ok(())
        }
    }
}
