//! Reconciliation sweep for stuck orders.
//!
//! A worker crash after retries are exhausted can leave an order in a
//! non-terminal status with no job left to finish it. The janitor scans the
//! active set on an interval and force-fails anything that has not moved
//! within the timeout, so a subscriber always reaches a terminal status.

use crate::store::{OrderChanges, OrderStore};
use chrono::Utc;
use common::subjects::status_subject;
use common::{OrderStatus, StatusUpdate};
use metrics::counter;
use nats_client::NatsClient;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const TIMEOUT_ERROR: &str = "execution timed out";

/// Configuration for the janitor sweep.
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// How long an order may sit unchanged in a non-terminal status.
    pub stuck_timeout: Duration,
    /// Sweep interval.
    pub sweep_interval: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            stuck_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Periodic stuck-order sweep.
pub struct Janitor {
    store: OrderStore,
    nats: NatsClient,
    config: JanitorConfig,
}

impl Janitor {
    pub fn new(store: OrderStore, nats: NatsClient, config: JanitorConfig) -> Self {
        Self {
            store,
            nats,
            config,
        }
    }

    /// Run the sweep loop (blocking).
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> anyhow::Result<()> {
        info!(
            "Janitor running (timeout {}s, sweep every {}s)",
            self.config.stuck_timeout.as_secs(),
            self.config.sweep_interval.as_secs()
        );

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Janitor received shutdown signal");
                    break;
                }

                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!("Janitor sweep failed: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// One pass over the active set.
    async fn sweep(&self) -> crate::error::Result<()> {
        let cutoff = chrono::Duration::from_std(self.config.stuck_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        let now = Utc::now();

        for id in self.store.active_orders().await? {
            let order = match self.store.get(&id).await? {
                Some(order) => order,
                None => continue,
            };

            // Pending orders still have a queue delivery coming; only
            // in-execution states can be abandoned by a dead worker.
            let failable = matches!(
                order.status,
                OrderStatus::Routing | OrderStatus::Building | OrderStatus::Submitted
            );
            if !failable || now - order.updated_at < cutoff {
                continue;
            }

            warn!(
                "Order {} stuck in {} since {}, failing it",
                id, order.status, order.updated_at
            );

            self.store
                .transition(
                    &id,
                    OrderStatus::Failed,
                    OrderChanges {
                        error: Some(TIMEOUT_ERROR.to_string()),
                        ..Default::default()
                    },
                )
                .await?;

            let update = StatusUpdate::new(id, OrderStatus::Failed).with_error(TIMEOUT_ERROR);
            if let Ok(payload) = serde_json::to_vec(&update) {
                if let Err(e) = self
                    .nats
                    .publish_fast(&status_subject(&id), payload.into())
                    .await
                {
                    warn!("Status broadcast for stuck order {} dropped: {}", id, e);
                }
            }

            counter!("executor_orders_reaped_total").increment(1);
        }

        Ok(())
    }
}
