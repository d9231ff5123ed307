//! WebSocket protocol message types.
//!
//! Defines the JSON message format for subscriber communication.

use common::{Order, StatusUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Client → Server Messages
// ============================================================================

/// Message sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to status updates for specific orders.
    Subscribe {
        /// Orders to watch.
        order_ids: Vec<Uuid>,
    },
    /// Unsubscribe from order status updates.
    Unsubscribe {
        /// Orders to stop watching.
        order_ids: Vec<Uuid>,
    },
    /// Ping message for keepalive.
    Ping,
}

// ============================================================================
// Server → Client Messages
// ============================================================================

/// Message sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current order record, sent on initial subscribe. Late subscribers
    /// see no replayed updates; the snapshot stands in for missed history.
    Snapshot(Order),
    /// Status update broadcast by a worker. Partial - merge into the
    /// accumulated view, do not replace it.
    Update(StatusUpdate),
    /// Pong response to ping.
    Pong,
    /// Confirmation of subscription.
    Subscribed { order_ids: Vec<Uuid> },
    /// Confirmation of unsubscription.
    Unsubscribed { order_ids: Vec<Uuid> },
    /// Error message.
    Error { message: String, code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_message_parses() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"type":"subscribe","order_ids":["{}"]}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ClientMessage::Subscribe { order_ids } => assert_eq!(order_ids, vec![id]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_ping_message_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_server_message_tags() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let json = serde_json::to_string(&ServerMessage::Error {
            message: "bad".to_string(),
            code: "PROCESSING_ERROR".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"error""#));
    }
}
