//! Redis-backed order state store.
//!
//! Key layout:
//! - `order:{id}` - JSON order record
//! - `user:{user_id}:orders` - list of order ids, newest first
//! - `orders:active` - set of non-terminal order ids (janitor scan set)
//!
//! Records are mutated only through `transition`, which enforces the
//! lifecycle state machine and the write-once fields. The queue's
//! one-active-job-per-order guarantee is the mutual exclusion here; the
//! store itself takes no extra locks.

use crate::error::{Error, Result};
use chrono::Utc;
use common::{Error as OrderError, Order, OrderStatus};
use redis::AsyncCommands;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

const ORDER_KEY_PREFIX: &str = "order:";
const ACTIVE_SET_KEY: &str = "orders:active";

/// Fields a transition may set. Write-once fields are applied only if the
/// record does not already carry a value (first write wins).
#[derive(Debug, Default, Clone)]
pub struct OrderChanges {
    pub selected_dex: Option<String>,
    pub amount_out: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

/// Redis client wrapper for order records.
#[derive(Clone)]
pub struct OrderStore {
    client: redis::Client,
}

impl OrderStore {
    /// Create a new store against a Redis URL.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    fn order_key(id: &Uuid) -> String {
        format!("{}{}", ORDER_KEY_PREFIX, id)
    }

    fn user_key(user_id: i64) -> String {
        format!("user:{}:orders", user_id)
    }

    /// Persist a fresh `Pending` order and index it for its user.
    pub async fn create(&self, order: &Order) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(order)?;

        conn.set::<_, _, ()>(Self::order_key(&order.id), &json).await?;
        conn.lpush::<_, _, ()>(Self::user_key(order.user_id), order.id.to_string())
            .await?;
        conn.sadd::<_, _, ()>(ACTIVE_SET_KEY, order.id.to_string())
            .await?;

        debug!("Created order {} for user {}", order.id, order.user_id);
        Ok(())
    }

    /// Fetch one order record.
    pub async fn get(&self, id: &Uuid) -> Result<Option<Order>> {
        let mut conn = self.get_connection().await?;
        let json: Option<String> = conn.get(Self::order_key(id)).await?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    /// Latest `limit` orders for a user, newest first.
    pub async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Order>> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn
            .lrange(Self::user_key(user_id), 0, limit as isize - 1)
            .await?;

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = conn.get(format!("{}{}", ORDER_KEY_PREFIX, id)).await?;
            if let Some(j) = json {
                orders.push(serde_json::from_str(&j)?);
            }
        }
        Ok(orders)
    }

    /// Advance an order to `next`, applying `changes`, and return the
    /// updated record.
    ///
    /// Rejects transitions the state machine forbids, including anything
    /// out of a terminal state. `error` is only accepted together with
    /// `Failed`. Terminal transitions drop the order from the active set.
    pub async fn transition(
        &self,
        id: &Uuid,
        next: OrderStatus,
        changes: OrderChanges,
    ) -> Result<Order> {
        let mut order = self.get(id).await?.ok_or(Error::OrderNotFound(*id))?;

        if !order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        order.status = next;
        if order.selected_dex.is_none() {
            order.selected_dex = changes.selected_dex;
        }
        if order.amount_out.is_none() {
            order.amount_out = changes.amount_out;
        }
        if order.tx_hash.is_none() {
            order.tx_hash = changes.tx_hash;
        }
        if next == OrderStatus::Failed {
            order.error = changes.error;
        }
        order.updated_at = Utc::now();

        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(&order)?;
        conn.set::<_, _, ()>(Self::order_key(id), &json).await?;

        if next.is_terminal() {
            conn.srem::<_, _, ()>(ACTIVE_SET_KEY, id.to_string()).await?;
        }

        debug!("Order {} -> {}", id, next);
        Ok(order)
    }

    /// Ids of every non-terminal order.
    pub async fn active_orders(&self) -> Result<Vec<Uuid>> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.smembers(ACTIVE_SET_KEY).await?;
        Ok(ids
            .into_iter()
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect())
    }

    /// Number of non-terminal orders (health endpoint).
    pub async fn active_count(&self) -> Result<usize> {
        let mut conn = self.get_connection().await?;
        let count: usize = conn.scard(ACTIVE_SET_KEY).await?;
        Ok(count)
    }
}
