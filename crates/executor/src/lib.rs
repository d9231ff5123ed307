//! Executor service for asynchronous swap-order execution.
//!
//! This crate provides:
//! - `OrderStore` - Redis-backed order records with a monotonic state machine
//! - `WorkerPool` - bounded-concurrency job consumer driving order lifecycles
//! - `RateLimiter` - global jobs-per-window throttle
//! - `Settlement` trait + `RpcSettlement` chain client
//! - `Janitor` - stuck-order reconciliation sweep
//! - HTTP API for order submission and reads
//!
//! # Architecture
//!
//! ```text
//!   POST /orders ──▶ OrderStore (pending) ──▶ job queue (dedup by order id)
//!                                                   │
//!                                             WorkerPool (N workers)
//!                                                   │
//!                              DexRouter.route ──▶ prepare ──▶ Settlement
//!                                                   │
//!                         OrderStore transition ──▶ status channel publish
//! ```

pub mod api;
pub mod error;
pub mod janitor;
pub mod limiter;
pub mod settlement;
pub mod store;
pub mod worker;

pub use error::{Error, Result};
pub use janitor::{Janitor, JanitorConfig};
pub use limiter::RateLimiter;
pub use settlement::{RpcSettlement, Settlement};
pub use store::{OrderChanges, OrderStore};
pub use worker::{WorkerConfig, WorkerPool};
