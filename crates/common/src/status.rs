//! Status-update envelope broadcast on the order status channel.

use crate::order::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Wire envelope published on every order status transition.
///
/// Updates are partial: each carries whichever fields are known at that
/// transition. A consumer tracking an order must `merge` later updates into
/// its accumulated view rather than replace it, so fields learned earlier
/// (e.g. the per-venue quote set) survive updates that omit them.
///
/// Delivery is fire-and-forget, at most once. The persisted order record is
/// the authoritative fallback for anything a consumer missed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_id: Uuid,
    pub status: OrderStatus,
    /// Venue name -> quoted output amount, for every venue that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex_quotes: Option<HashMap<String, Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_dex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    /// A bare envelope for a transition with no extra fields.
    pub fn new(order_id: Uuid, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            dex_quotes: None,
            selected_dex: None,
            tx_hash: None,
            execution_price: None,
            amount_out: None,
            error: None,
        }
    }

    pub fn with_selected_dex(mut self, dex: impl Into<String>) -> Self {
        self.selected_dex = Some(dex.into());
        self
    }

    pub fn with_dex_quotes(mut self, quotes: HashMap<String, Decimal>) -> Self {
        self.dex_quotes = Some(quotes);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_execution_price(mut self, price: Decimal) -> Self {
        self.execution_price = Some(price);
        self
    }

    pub fn with_amount_out(mut self, amount: Decimal) -> Self {
        self.amount_out = Some(amount);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Merge a later update for the same order into this accumulated view.
    ///
    /// The later status always wins; optional fields are taken from the
    /// later update only where it actually carries them. Merging the same
    /// update twice is a no-op beyond the first application.
    pub fn merge(&mut self, later: &StatusUpdate) {
        debug_assert_eq!(self.order_id, later.order_id);
        self.status = later.status;
        if later.dex_quotes.is_some() {
            self.dex_quotes = later.dex_quotes.clone();
        }
        if later.selected_dex.is_some() {
            self.selected_dex = later.selected_dex.clone();
        }
        if later.tx_hash.is_some() {
            self.tx_hash = later.tx_hash.clone();
        }
        if later.execution_price.is_some() {
            self.execution_price = later.execution_price;
        }
        if later.amount_out.is_some() {
            self.amount_out = later.amount_out;
        }
        if later.error.is_some() {
            self.error = later.error.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotes() -> HashMap<String, Decimal> {
        let mut m = HashMap::new();
        m.insert("raydium".to_string(), Decimal::new(1500, 1));
        m.insert("meteora".to_string(), Decimal::new(1523, 1));
        m
    }

    #[test]
    fn test_merge_keeps_earlier_fields() {
        let id = Uuid::new_v4();
        let mut view = StatusUpdate::new(id, OrderStatus::Building)
            .with_dex_quotes(quotes())
            .with_selected_dex("meteora");

        // Confirmation carries only the settlement fields.
        let confirmed = StatusUpdate::new(id, OrderStatus::Confirmed)
            .with_tx_hash("5vJk...sig")
            .with_amount_out(Decimal::new(1523, 1));
        view.merge(&confirmed);

        assert_eq!(view.status, OrderStatus::Confirmed);
        assert_eq!(view.selected_dex.as_deref(), Some("meteora"));
        assert!(view.dex_quotes.is_some());
        assert_eq!(view.tx_hash.as_deref(), Some("5vJk...sig"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let id = Uuid::new_v4();
        let mut view = StatusUpdate::new(id, OrderStatus::Routing);
        let update = StatusUpdate::new(id, OrderStatus::Building).with_selected_dex("raydium");

        view.merge(&update);
        let first = serde_json::to_string(&view).unwrap();
        view.merge(&update);
        let second = serde_json::to_string(&view).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_fields_skipped_in_json() {
        let update = StatusUpdate::new(Uuid::new_v4(), OrderStatus::Routing);
        let json = serde_json::to_string(&update).unwrap();
        assert!(!json.contains("tx_hash"));
        assert!(!json.contains("dex_quotes"));
    }
}
