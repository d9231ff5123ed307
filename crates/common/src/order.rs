//! Order record, lifecycle state machine, and queue job payload.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order lifecycle status.
///
/// Legal forward chain: `Pending -> Routing -> Building -> Submitted ->
/// Confirmed`, with `Failed` reachable from `Routing`, `Building`, or
/// `Submitted`. Terminal states are absorbing; no transition moves backward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order record created, job not yet picked up by a worker.
    Pending,
    /// Worker is collecting quotes from liquidity venues.
    Routing,
    /// Best venue selected, swap transaction being assembled.
    Building,
    /// Transaction handed to the settlement layer, awaiting confirmation.
    Submitted,
    /// Settlement confirmed (terminal success).
    Confirmed,
    /// Unrecoverable error at any step (terminal failure).
    Failed,
}

impl OrderStatus {
    /// Whether this status is terminal (no further transitions admitted).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Self-transitions are rejected along with anything backward or out of
    /// a terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Routing)
                | (Routing, Building)
                | (Building, Submitted)
                | (Submitted, Confirmed)
                | (Routing, Failed)
                | (Building, Failed)
                | (Submitted, Failed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Routing => write!(f, "routing"),
            OrderStatus::Building => write!(f, "building"),
            OrderStatus::Submitted => write!(f, "submitted"),
            OrderStatus::Confirmed => write!(f, "confirmed"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Durable order record, owned by the order store.
///
/// `amount_out`, `selected_dex`, and `tx_hash` are write-once: set at most
/// once over the order's lifetime, never reset. `error` is only set together
/// with the terminal `Failed` status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique, immutable order identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: i64,
    /// Input token symbol (e.g. "SOL").
    pub token_in: String,
    /// Output token symbol (e.g. "USDC").
    pub token_out: String,
    /// Input amount in whole-token units.
    pub amount_in: Decimal,
    /// Realized output amount, known after execution.
    pub amount_out: Option<Decimal>,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Venue the order was routed to, known after routing.
    pub selected_dex: Option<String>,
    /// Settlement transaction signature, known after submission.
    pub tx_hash: Option<String>,
    /// Human-readable failure reason, set only on terminal failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a fresh `Pending` order record.
    pub fn new(
        user_id: i64,
        token_in: impl Into<String>,
        token_out: impl Into<String>,
        amount_in: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount_in,
            amount_out: None,
            status: OrderStatus::Pending,
            selected_dex: None,
            tx_hash: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Queue payload: exactly the inputs a worker needs to drive one order.
///
/// The queue's uniqueness key is `order_id` - a second job for an order
/// already in flight or already completed must not cause a second execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderJob {
    pub order_id: Uuid,
    pub user_id: i64,
    /// Already-validated settlement wallet address.
    pub wallet_address: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    /// Acceptable slippage as a fraction in [0, 1].
    pub slippage: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain_is_legal() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Routing));
        assert!(Routing.can_transition_to(Building));
        assert!(Building.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Confirmed));
    }

    #[test]
    fn test_failure_reachable_from_active_states() {
        use OrderStatus::*;
        assert!(Routing.can_transition_to(Failed));
        assert!(Building.can_transition_to(Failed));
        assert!(Submitted.can_transition_to(Failed));
        // Pending orders have not started executing; they fail by first
        // entering routing.
        assert!(!Pending.can_transition_to(Failed));
    }

    #[test]
    fn test_no_backward_transitions() {
        use OrderStatus::*;
        assert!(!Routing.can_transition_to(Pending));
        assert!(!Building.can_transition_to(Routing));
        assert!(!Submitted.can_transition_to(Building));
        assert!(!Confirmed.can_transition_to(Submitted));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        use OrderStatus::*;
        for next in [Pending, Routing, Building, Submitted, Confirmed, Failed] {
            assert!(!Confirmed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
        assert!(Confirmed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Building.is_terminal());
    }

    #[test]
    fn test_no_skipping_states() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Building));
        assert!(!Pending.can_transition_to(Confirmed));
        assert!(!Routing.can_transition_to(Submitted));
    }

    #[test]
    fn test_status_serde_roundtrip() {
        let json = serde_json::to_string(&OrderStatus::Routing).unwrap();
        assert_eq!(json, "\"routing\"");
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::Routing);
    }

    #[test]
    fn test_new_order_starts_pending() {
        let order = Order::new(7, "SOL", "USDC", Decimal::new(15, 1));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.amount_out.is_none());
        assert!(order.selected_dex.is_none());
        assert!(order.tx_hash.is_none());
        assert_eq!(order.created_at, order.updated_at);
    }
}
