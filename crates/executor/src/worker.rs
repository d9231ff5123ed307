//! Worker pool: pulls order jobs from the queue and drives each order
//! through its lifecycle.
//!
//! Per job, in order: `routing` -> route across venues -> `building` (with
//! the chosen venue recorded) -> build the swap -> `submitted` -> settle ->
//! `confirmed`, or `failed` at any step. Every transition is persisted to
//! the order store first and then broadcast on the status channel -
//! persistence is the source of truth, the broadcast is best-effort.
//!
//! Concurrency is bounded by a semaphore; a global fixed-window rate limit
//! protects downstream venues. Redeliveries of an order already in flight
//! are acknowledged without a second execution.

use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::settlement::Settlement;
use crate::store::{OrderChanges, OrderStore};
use async_nats::jetstream::AckKind;
use common::subjects::status_subject;
use common::{OrderJob, OrderStatus, StatusUpdate};
use dashmap::DashSet;
use dex::DexRouter;
use futures::StreamExt;
use metrics::counter;
use nats_client::{JobQueueConfig, NatsClient};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs processed concurrently.
    pub concurrency: usize,
    /// Global rate limit: jobs per window.
    pub rate_limit_max: u32,
    /// Rate limit window.
    pub rate_limit_window: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

/// Position of a status in the forward chain, for resume-aware skipping.
fn chain_position(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Routing => 1,
        OrderStatus::Building => 2,
        OrderStatus::Submitted => 3,
        OrderStatus::Confirmed => 4,
        OrderStatus::Failed => 4,
    }
}

/// Whether a redelivered job has already persisted `next` (or something
/// later), so the transition should be skipped rather than replayed.
fn already_reached(current: OrderStatus, next: OrderStatus) -> bool {
    chain_position(current) >= chain_position(next)
}

/// Realized execution price: output per unit of input.
fn execution_price(amount_in: Decimal, amount_out: Decimal) -> Decimal {
    if amount_in.is_zero() {
        Decimal::ZERO
    } else {
        amount_out / amount_in
    }
}

/// Removes the order id from the in-flight set when the job finishes,
/// whatever path it took.
struct InFlightGuard {
    set: Arc<DashSet<Uuid>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// The worker pool service.
pub struct WorkerPool {
    store: OrderStore,
    nats: NatsClient,
    router: Arc<DexRouter>,
    settlement: Arc<dyn Settlement>,
    limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<DashSet<Uuid>>,
    queue_config: JobQueueConfig,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(
        store: OrderStore,
        nats: NatsClient,
        router: Arc<DexRouter>,
        settlement: Arc<dyn Settlement>,
        queue_config: JobQueueConfig,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            nats,
            router,
            settlement,
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window,
            )),
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            in_flight: Arc::new(DashSet::new()),
            queue_config,
            config,
        }
    }

    /// Number of jobs currently executing.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Run the pool (blocking): pull jobs until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) -> anyhow::Result<()> {
        info!(
            "Worker pool starting (concurrency {}, {} jobs per {}s)",
            self.config.concurrency,
            self.config.rate_limit_max,
            self.config.rate_limit_window.as_secs()
        );

        let consumer = self.nats.job_consumer(&self.queue_config).await?;
        let mut messages = consumer.messages().await?;

        info!("Worker pool pulling from '{}'", self.queue_config.stream);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Worker pool received shutdown signal");
                    break;
                }

                msg = messages.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("Job pull failed: {}", e);
                            continue;
                        }
                        None => {
                            warn!("Job stream ended unexpectedly");
                            break;
                        }
                    };

                    // Backpressure before spawning: a rate-limit slot and a
                    // concurrency permit.
                    self.limiter.acquire().await;
                    let permit = match self.semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let pool = self.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        pool.handle_message(msg).await;
                    });
                }
            }
        }

        info!("Worker pool stopped");
        Ok(())
    }

    /// Handle one queue delivery end to end, including acking.
    async fn handle_message(&self, msg: async_nats::jetstream::Message) {
        let job: OrderJob = match serde_json::from_slice(&msg.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!("Dropping malformed job payload: {}", e);
                counter!("executor_jobs_malformed_total").increment(1);
                ack(&msg).await;
                return;
            }
        };

        let delivered = msg.info().map(|i| i.delivered).unwrap_or(1);

        // One execution per order at a time; a duplicate delivery while the
        // first is still running is merged into it (acked, not re-run).
        if !self.in_flight.insert(job.order_id) {
            info!(
                "Order {} already in flight, merging duplicate delivery",
                job.order_id
            );
            counter!("executor_jobs_deduped_total").increment(1);
            ack(&msg).await;
            return;
        }
        let _guard = InFlightGuard {
            set: self.in_flight.clone(),
            id: job.order_id,
        };

        // Terminal orders admit no further work.
        match self.store.get(&job.order_id).await {
            Ok(Some(order)) if order.status.is_terminal() => {
                info!(
                    "Order {} already {}, dropping job",
                    job.order_id, order.status
                );
                ack(&msg).await;
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("Job references unknown order {}", job.order_id);
                ack(&msg).await;
                return;
            }
            Err(e) => {
                warn!("Order lookup failed for {}: {}", job.order_id, e);
                nak(&msg).await;
                return;
            }
        }

        info!(
            "Processing order {} ({} {} -> {}, attempt {})",
            job.order_id, job.amount_in, job.token_in, job.token_out, delivered
        );

        match self.execute(&job).await {
            Ok(()) => {
                counter!("executor_jobs_processed_total").increment(1);
                ack(&msg).await;
            }
            Err(e) if e.is_transient() => {
                counter!("executor_jobs_retried_total").increment(1);
                if delivered >= self.queue_config.max_deliver {
                    error!(
                        "Order {} retries exhausted after attempt {}: {}",
                        job.order_id, delivered, e
                    );
                    self.fail_order(job.order_id, Error::QueueExhausted.to_string())
                        .await;
                    ack(&msg).await;
                } else {
                    warn!(
                        "Order {} attempt {} hit transient error, redelivering: {}",
                        job.order_id, delivered, e
                    );
                    nak(&msg).await;
                }
            }
            Err(e) => {
                error!("Order {} failed: {}", job.order_id, e);
                counter!("executor_jobs_failed_total").increment(1);
                self.fail_order(job.order_id, e.to_string()).await;
                ack(&msg).await;
            }
        }
    }

    /// Drive the order through the state machine.
    async fn execute(&self, job: &OrderJob) -> Result<()> {
        let id = job.order_id;

        self.advance(
            id,
            OrderStatus::Routing,
            OrderChanges::default(),
            StatusUpdate::new(id, OrderStatus::Routing),
        )
        .await?;

        let decision = self
            .router
            .route(&job.token_in, &job.token_out, job.amount_in)
            .await?;

        self.advance(
            id,
            OrderStatus::Building,
            OrderChanges {
                selected_dex: Some(decision.selected_venue.clone()),
                amount_out: Some(decision.output_amount),
                ..Default::default()
            },
            StatusUpdate::new(id, OrderStatus::Building)
                .with_dex_quotes(decision.quoted_amounts())
                .with_selected_dex(decision.selected_venue.clone())
                .with_amount_out(decision.output_amount),
        )
        .await?;

        let instruction = self
            .router
            .prepare(&decision, &job.wallet_address, job.slippage)
            .await?;

        self.advance(
            id,
            OrderStatus::Submitted,
            OrderChanges::default(),
            StatusUpdate::new(id, OrderStatus::Submitted)
                .with_selected_dex(decision.selected_venue.clone()),
        )
        .await?;

        let tx_hash = self.settlement.submit_and_confirm(&instruction).await?;

        self.advance(
            id,
            OrderStatus::Confirmed,
            OrderChanges {
                tx_hash: Some(tx_hash.clone()),
                ..Default::default()
            },
            StatusUpdate::new(id, OrderStatus::Confirmed)
                .with_selected_dex(decision.selected_venue.clone())
                .with_tx_hash(tx_hash)
                .with_amount_out(decision.output_amount)
                .with_execution_price(execution_price(job.amount_in, decision.output_amount)),
        )
        .await?;

        info!("Order {} confirmed", id);
        Ok(())
    }

    /// Persist a transition, then broadcast it.
    ///
    /// Skips transitions a previous delivery already persisted, so a
    /// redelivered job resumes instead of tripping the state machine.
    async fn advance(
        &self,
        id: Uuid,
        next: OrderStatus,
        changes: OrderChanges,
        update: StatusUpdate,
    ) -> Result<()> {
        let current = self
            .store
            .get(&id)
            .await?
            .ok_or(Error::OrderNotFound(id))?;

        if already_reached(current.status, next) {
            return Ok(());
        }

        self.store.transition(&id, next, changes).await?;
        self.publish_update(&update).await;
        Ok(())
    }

    /// Terminate the order as failed with a human-readable reason.
    ///
    /// An order still `pending` (its routing transition never persisted) is
    /// first moved through `routing` so the failure stays on a legal path.
    async fn fail_order(&self, id: Uuid, reason: String) {
        let current = match self.store.get(&id).await {
            Ok(Some(order)) => order,
            Ok(None) => return,
            Err(e) => {
                error!("Cannot load order {} to fail it: {}", id, e);
                return;
            }
        };
        if current.status.is_terminal() {
            return;
        }

        if current.status == OrderStatus::Pending {
            if let Err(e) = self
                .store
                .transition(&id, OrderStatus::Routing, OrderChanges::default())
                .await
            {
                error!("Cannot advance order {} before failing it: {}", id, e);
                return;
            }
            self.publish_update(&StatusUpdate::new(id, OrderStatus::Routing))
                .await;
        }

        match self
            .store
            .transition(
                &id,
                OrderStatus::Failed,
                OrderChanges {
                    error: Some(reason.clone()),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(_) => {
                self.publish_update(
                    &StatusUpdate::new(id, OrderStatus::Failed).with_error(reason),
                )
                .await;
            }
            Err(e) => error!("Cannot persist failure for order {}: {}", id, e),
        }
    }

    /// Fire-and-forget status broadcast. Failures are logged and swallowed;
    /// the persisted record stays authoritative.
    async fn publish_update(&self, update: &StatusUpdate) {
        let payload = match serde_json::to_vec(update) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Cannot serialize status update: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .nats
            .publish_fast(&status_subject(&update.order_id), payload.into())
            .await
        {
            warn!(
                "Status broadcast for order {} dropped: {}",
                update.order_id, e
            );
        } else {
            counter!("executor_status_published_total").increment(1);
        }
    }
}

async fn ack(msg: &async_nats::jetstream::Message) {
    if let Err(e) = msg.ack().await {
        warn!("Job ack failed: {}", e);
    }
}

async fn nak(msg: &async_nats::jetstream::Message) {
    if let Err(e) = msg.ack_with(AckKind::Nak(None)).await {
        warn!("Job nak failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_already_reached_skips_persisted_transitions() {
        use OrderStatus::*;
        // Fresh order: nothing reached yet.
        assert!(!already_reached(Pending, Routing));
        assert!(!already_reached(Routing, Building));
        // Redelivery after a crash mid-build resumes without replaying.
        assert!(already_reached(Building, Routing));
        assert!(already_reached(Building, Building));
        assert!(!already_reached(Building, Submitted));
    }

    #[test]
    fn test_execution_price() {
        assert_eq!(execution_price(dec!(1.5), dec!(152.3)), dec!(152.3) / dec!(1.5));
        assert_eq!(execution_price(Decimal::ZERO, dec!(10)), Decimal::ZERO);
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let set: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());
        let id = Uuid::new_v4();

        assert!(set.insert(id));
        {
            let _guard = InFlightGuard {
                set: set.clone(),
                id,
            };
            // A second insert while the guard lives is refused.
            assert!(!set.insert(id));
        }
        assert!(set.insert(id));
    }
}
