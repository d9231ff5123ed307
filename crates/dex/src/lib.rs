//! DEX routing for token-swap orders.
//!
//! This crate provides:
//! - `Venue` trait for venue-specific quoting and swap building
//! - `QuoteAggregator` for concurrent multi-venue price discovery
//! - `DexRouter` composing aggregation and building into one router
//! - `RaydiumVenue` / `MeteoraVenue` production adapters
//!
//! # Architecture
//!
//! ```text
//!                     ROUTE REQUEST
//!                          │
//!                          ▼
//!                      DexRouter
//!                          │
//!                   QuoteAggregator
//!                          │
//!              ┌───────────┴───────────┐
//!              ▼                       ▼
//!        RaydiumVenue            MeteoraVenue
//!        (pool API)              (dynamic AMM)
//!              └───────────┬───────────┘
//!                          ▼
//!                  RoutingDecision ──▶ prepare() ──▶ SwapInstruction
//! ```
//!
//! Routing and building are separate calls so a caller can publish the
//! routing decision before committing to the more expensive build step.

pub mod aggregator;
pub mod error;
pub mod router;
pub mod traits;
pub mod types;
pub mod venues;

pub use aggregator::QuoteAggregator;
pub use error::{Error, Result};
pub use router::DexRouter;
pub use traits::Venue;
pub use types::{QuoteRequest, RoutingDecision, SwapInstruction, SwapRequest, VenueOutcome, VenueQuote};
