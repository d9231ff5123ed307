//! Venue trait for venue-specific quoting and swap building.
//!
//! Each liquidity venue (Raydium, Meteora, ...) implements this trait so
//! the aggregator and router stay venue-count-agnostic. Adapters are
//! explicitly constructed and injected; nothing here is process-global.

use crate::error::Result;
use crate::types::{QuoteRequest, SwapInstruction, SwapRequest, VenueQuote};
use async_trait::async_trait;

/// Trait for venue-specific quote and swap-build operations.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl Venue for RaydiumVenue {
///     fn name(&self) -> &'static str {
///         "raydium"
///     }
///
///     async fn quote(&self, req: &QuoteRequest) -> Result<VenueQuote> {
///         // Implementation
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Venue: Send + Sync {
    /// Get the venue name (e.g. "raydium", "meteora").
    fn name(&self) -> &'static str;

    /// Price the swap on this venue.
    ///
    /// Fails independently of other venues: unreachable API, no pool for
    /// the pair, malformed pool state. The aggregator absorbs individual
    /// failures as long as at least one venue succeeds.
    async fn quote(&self, req: &QuoteRequest) -> Result<VenueQuote>;

    /// Assemble an unsigned swap transaction for this venue.
    ///
    /// The minimum-output bound is derived from the quoted output and the
    /// request's slippage; amounts are scaled with each token's own
    /// decimal precision.
    async fn build_swap(&self, req: &SwapRequest) -> Result<SwapInstruction>;
}
