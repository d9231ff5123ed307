//! Status relay: NATS → WebSocket fan-out.
//!
//! Subscribes to the order status channel and forwards each update to the
//! subscriber group of the matching order. The relay holds no order state:
//! a re-delivered update is simply re-broadcast. Missed history is covered
//! by the snapshot sent at subscribe time.

use crate::client::{ClientRegistry, ClientState};
use crate::error::Result;
use crate::protocol::ServerMessage;
use common::subjects::STATUS_WILDCARD;
use common::{Order, StatusUpdate};
use futures::StreamExt;
use metrics::counter;
use nats_client::NatsClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the status relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// NATS subject pattern to subscribe to.
    pub status_subject: String,
    /// Base URL for the executor HTTP API (snapshot fetches).
    pub executor_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            status_subject: STATUS_WILDCARD.to_string(),
            executor_url: "http://localhost:8084".to_string(),
        }
    }
}

/// Routes order status updates from NATS to WebSocket clients.
pub struct StatusRelay {
    /// Client registry for routing messages.
    registry: Arc<ClientRegistry>,
    /// NATS client for subscribing to updates.
    nats_client: Arc<NatsClient>,
    /// HTTP client for fetching snapshots.
    http_client: reqwest::Client,
    /// Configuration.
    config: RelayConfig,
}

impl StatusRelay {
    /// Create a new status relay.
    pub fn new(
        registry: Arc<ClientRegistry>,
        nats_client: Arc<NatsClient>,
        config: RelayConfig,
    ) -> Self {
        Self {
            registry,
            nats_client,
            http_client: reqwest::Client::new(),
            config,
        }
    }

    /// Run the relay (blocking).
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!(
            "Starting StatusRelay, subscribing to '{}'",
            self.config.status_subject
        );

        let mut subscriber = self
            .nats_client
            .subscribe(&self.config.status_subject)
            .await
            .map_err(|e| crate::error::GatewayError::Nats(e.to_string()))?;

        info!("StatusRelay running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("StatusRelay received shutdown signal");
                    break;
                }

                msg = subscriber.next() => {
                    match msg {
                        Some(nats_msg) => {
                            if let Err(e) = self.handle_update(&nats_msg.payload) {
                                warn!("Failed to handle status update: {:?}", e);
                                counter!("gateway_relay_errors_total").increment(1);
                            }
                        }
                        None => {
                            warn!("NATS subscription ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!("StatusRelay stopped");
        Ok(())
    }

    /// Forward one status update to its order's subscriber group.
    fn handle_update(&self, payload: &[u8]) -> Result<()> {
        let update: StatusUpdate = serde_json::from_slice(payload)?;

        counter!("gateway_updates_received_total").increment(1);

        let order_id = update.order_id;
        let sent = self
            .registry
            .broadcast(&order_id, &ServerMessage::Update(update));

        if sent == 0 {
            debug!("No clients subscribed to order {}", order_id);
        } else {
            debug!("Routed update for order {} to {} clients", order_id, sent);
            counter!("gateway_updates_routed_total").increment(sent as u64);
        }

        Ok(())
    }

    /// Send the current order record to a freshly subscribed client.
    ///
    /// There is no update replay; the snapshot is how a late subscriber
    /// learns everything that happened before it joined.
    pub async fn send_snapshot(&self, client: &Arc<ClientState>, order_id: &Uuid) -> Result<()> {
        let url = format!("{}/orders/{}", self.config.executor_url, order_id);

        debug!("Fetching snapshot from: {}", url);

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            warn!(
                "Failed to fetch snapshot for order {}: {}",
                order_id,
                response.status()
            );
            return Ok(()); // Don't error, just skip the snapshot
        }

        let order: Order = response.json().await?;
        client.send(&ServerMessage::Snapshot(order))?;

        counter!("gateway_snapshots_sent_total").increment(1);

        Ok(())
    }
}
