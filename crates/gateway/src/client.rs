//! Client state and per-order subscriber registry.
//!
//! Uses lock-free DashMap for concurrent access from the WebSocket handlers
//! and the relay loop. Groups are keyed by exact order id - an update for
//! one order reaches only the clients that asked for that order.

use crate::error::{GatewayError, Result};
use crate::protocol::ServerMessage;
use axum::extract::ws::Message;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique client identifier.
pub type ClientId = Uuid;

/// Buffer size for client message channels. A slow client that falls this
/// far behind starts losing messages rather than stalling the relay.
pub const CLIENT_CHANNEL_BUFFER_SIZE: usize = 256;

/// State for a single connected client.
pub struct ClientState {
    /// Unique client identifier.
    pub id: ClientId,
    /// Channel to the client's WebSocket send task.
    pub tx: mpsc::Sender<Message>,
    /// Orders this client is watching.
    pub subscriptions: DashSet<Uuid>,
    /// Timestamp when client connected.
    pub connected_at: i64,
    /// Timestamp of last ping received.
    pub last_ping: AtomicI64,
}

impl ClientState {
    /// Create a new client state with a bounded channel.
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4(),
            tx,
            subscriptions: DashSet::new(),
            connected_at: now,
            last_ping: AtomicI64::new(now),
        }
    }

    /// Send a message to this client.
    /// Non-blocking - a full buffer drops the message (slow client).
    pub fn send(&self, msg: &ServerMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.tx
            .try_send(Message::Text(json.into()))
            .map_err(|_| GatewayError::ChannelSend)
    }

    /// Update the last ping timestamp.
    pub fn update_ping(&self) {
        self.last_ping
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Get the last ping timestamp.
    pub fn last_ping_time(&self) -> i64 {
        self.last_ping.load(Ordering::Relaxed)
    }
}

/// Lock-free registry of connected clients and their order groups.
pub struct ClientRegistry {
    /// Client ID -> Client State.
    clients: DashMap<ClientId, Arc<ClientState>>,
    /// Order id -> subscribed client ids.
    groups: DashMap<Uuid, DashSet<ClientId>>,
}

impl ClientRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register a new client.
    pub fn register(&self, client: Arc<ClientState>) -> ClientId {
        let id = client.id;
        self.clients.insert(id, client);
        info!("Client {} registered", id);
        id
    }

    /// Unregister a client and clean up its group memberships.
    pub fn unregister(&self, client_id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(client_id) {
            for order_id in client.subscriptions.iter() {
                if let Some(group) = self.groups.get(&order_id) {
                    group.remove(client_id);
                }
            }
            info!("Client {} unregistered", client_id);
        }
    }

    /// Get a client by ID.
    pub fn get(&self, client_id: &ClientId) -> Option<Arc<ClientState>> {
        self.clients.get(client_id).map(|r| r.clone())
    }

    /// Join a client to the groups for the given orders.
    ///
    /// A client may join before or after any given update; there is no
    /// replay - it only sees updates published after it joined.
    pub fn subscribe(&self, client_id: &ClientId, order_ids: &[Uuid]) -> Result<()> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| GatewayError::ClientNotFound(client_id.to_string()))?;

        for order_id in order_ids {
            client.subscriptions.insert(*order_id);
            self.groups.entry(*order_id).or_default().insert(*client_id);
        }

        debug!(
            "Client {} subscribed to {} orders",
            client_id,
            order_ids.len()
        );
        Ok(())
    }

    /// Remove a client from the groups for the given orders.
    pub fn unsubscribe(&self, client_id: &ClientId, order_ids: &[Uuid]) -> Result<()> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| GatewayError::ClientNotFound(client_id.to_string()))?;

        for order_id in order_ids {
            client.subscriptions.remove(order_id);
            if let Some(group) = self.groups.get(order_id) {
                group.remove(client_id);
            }
        }

        debug!(
            "Client {} unsubscribed from {} orders",
            client_id,
            order_ids.len()
        );
        Ok(())
    }

    /// All clients subscribed to an order.
    pub fn subscribers(&self, order_id: &Uuid) -> Vec<Arc<ClientState>> {
        match self.groups.get(order_id) {
            Some(group) => group
                .iter()
                .filter_map(|id| self.clients.get(&id).map(|c| c.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Broadcast a message to an order's subscriber group.
    ///
    /// Serializes once and forwards; slow clients drop the message rather
    /// than blocking the relay. No other side effect - re-broadcasting the
    /// same update is harmless.
    pub fn broadcast(&self, order_id: &Uuid, msg: &ServerMessage) -> usize {
        let clients = self.subscribers(order_id);
        if clients.is_empty() {
            return 0;
        }

        let json = match serde_json::to_string(msg) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize broadcast message: {}", e);
                return 0;
            }
        };

        let mut sent = 0;
        for client in clients {
            match client.tx.try_send(Message::Text(json.clone().into())) {
                Ok(()) => sent += 1,
                Err(e) => debug!("Failed to send to client {}: {}", client.id, e),
            }
        }
        sent
    }

    /// Get the total number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Get the number of orders with at least one subscriber.
    pub fn group_count(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_empty()).count()
    }

    /// Remove stale clients that haven't pinged in a while.
    pub fn cleanup_stale_clients(&self, max_idle_ms: i64) {
        let now = Utc::now().timestamp_millis();
        let mut stale_ids = Vec::new();

        for entry in self.clients.iter() {
            if now - entry.value().last_ping_time() > max_idle_ms {
                stale_ids.push(*entry.key());
            }
        }

        for id in stale_ids {
            warn!("Removing stale client {}", id);
            self.unregister(&id);
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderStatus, StatusUpdate};

    fn connect(registry: &ClientRegistry) -> (Arc<ClientState>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_BUFFER_SIZE);
        let client = Arc::new(ClientState::new(tx));
        registry.register(client.clone());
        (client, rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_subscribers() {
        let registry = ClientRegistry::new();
        let (watcher, mut watcher_rx) = connect(&registry);
        let (bystander, mut bystander_rx) = connect(&registry);

        let order_id = Uuid::new_v4();
        registry.subscribe(&watcher.id, &[order_id]).unwrap();
        registry
            .subscribe(&bystander.id, &[Uuid::new_v4()])
            .unwrap();

        let update = StatusUpdate::new(order_id, OrderStatus::Routing);
        let sent = registry.broadcast(&order_id, &ServerMessage::Update(update));

        assert_eq!(sent, 1);
        assert!(watcher_rx.try_recv().is_ok());
        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rebroadcast_has_no_extra_side_effect() {
        let registry = ClientRegistry::new();
        let (watcher, mut rx) = connect(&registry);
        let order_id = Uuid::new_v4();
        registry.subscribe(&watcher.id, &[order_id]).unwrap();

        let update = StatusUpdate::new(order_id, OrderStatus::Confirmed);
        let msg = ServerMessage::Update(update);

        // Re-delivering the same update just re-broadcasts it.
        registry.broadcast(&order_id, &msg);
        registry.broadcast(&order_id, &msg);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.client_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let registry = ClientRegistry::new();
        let (watcher, mut rx) = connect(&registry);
        let order_id = Uuid::new_v4();

        registry.subscribe(&watcher.id, &[order_id]).unwrap();
        registry.unsubscribe(&watcher.id, &[order_id]).unwrap();

        let update = StatusUpdate::new(order_id, OrderStatus::Routing);
        let sent = registry.broadcast(&order_id, &ServerMessage::Update(update));

        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_cleans_groups() {
        let registry = ClientRegistry::new();
        let (watcher, _rx) = connect(&registry);
        let order_id = Uuid::new_v4();
        registry.subscribe(&watcher.id, &[order_id]).unwrap();

        registry.unregister(&watcher.id);

        assert_eq!(registry.client_count(), 0);
        assert!(registry.subscribers(&order_id).is_empty());
    }

    #[tokio::test]
    async fn test_slow_client_drops_instead_of_blocking() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let client = Arc::new(ClientState::new(tx));
        registry.register(client.clone());

        let order_id = Uuid::new_v4();
        registry.subscribe(&client.id, &[order_id]).unwrap();

        let msg = ServerMessage::Update(StatusUpdate::new(order_id, OrderStatus::Routing));
        assert_eq!(registry.broadcast(&order_id, &msg), 1);
        // Buffer is now full; the next broadcast drops for this client.
        assert_eq!(registry.broadcast(&order_id, &msg), 0);
    }
}
