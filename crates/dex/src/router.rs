//! DEX router composing quote aggregation and swap building.

use crate::aggregator::QuoteAggregator;
use crate::error::{Error, Result};
use crate::types::{QuoteRequest, RoutingDecision, SwapInstruction, SwapRequest};
use common::{TokenRegistry, TokenInfo};
use rust_decimal::Decimal;
use tracing::info;

/// Routes a swap to the best venue and prepares its execution.
///
/// `route` and `prepare` are separate calls so the worker can publish the
/// routing decision before committing to the more expensive build step.
/// No retries here; retry policy lives at the queue layer.
pub struct DexRouter {
    registry: TokenRegistry,
    aggregator: QuoteAggregator,
}

impl DexRouter {
    /// Create a router over the given registry and aggregator.
    pub fn new(registry: TokenRegistry, aggregator: QuoteAggregator) -> Self {
        Self {
            registry,
            aggregator,
        }
    }

    /// Registered venue names, in priority order.
    pub fn venues(&self) -> Vec<&'static str> {
        self.aggregator.venue_names()
    }

    /// Resolve both token symbols through the registry.
    fn resolve_pair(&self, token_in: &str, token_out: &str) -> Result<(TokenInfo, TokenInfo)> {
        let token_in = self.registry.resolve(token_in)?.clone();
        let token_out = self.registry.resolve(token_out)?.clone();
        Ok((token_in, token_out))
    }

    /// Find the best execution venue for the pair.
    pub async fn route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Result<RoutingDecision> {
        let (token_in, token_out) = self.resolve_pair(token_in, token_out)?;

        info!(
            "Routing {} {} -> {} across {:?}",
            amount_in,
            token_in.symbol,
            token_out.symbol,
            self.venues()
        );

        self.aggregator
            .best_quote(&QuoteRequest {
                token_in,
                token_out,
                amount_in,
            })
            .await
    }

    /// Build the unsigned swap transaction for a routing decision.
    pub async fn prepare(
        &self,
        decision: &RoutingDecision,
        wallet_address: &str,
        slippage: Decimal,
    ) -> Result<SwapInstruction> {
        let venue = self
            .aggregator
            .venue(&decision.selected_venue)
            .ok_or_else(|| Error::UnknownVenue(decision.selected_venue.clone()))?;

        venue
            .build_swap(&SwapRequest {
                wallet_address: wallet_address.to_string(),
                token_in: decision.token_in.clone(),
                token_out: decision.token_out.clone(),
                amount_in: decision.amount_in,
                slippage,
            })
            .await
    }
}

/// Slippage-bounded minimum output for a quoted amount.
///
/// `quoted * (1 - slippage)`, in whole output-token units. Scaling to the
/// output token's base units is each venue's job since precision differs
/// per token.
pub fn min_amount_out(quoted: Decimal, slippage: Decimal) -> Decimal {
    quoted * (Decimal::ONE - slippage)
}

/// Convert a whole-token amount to base units under the token's decimals.
///
/// Truncates sub-base-unit dust, matching how on-chain amounts are encoded.
pub fn to_base_units(amount: Decimal, decimals: u8) -> u64 {
    let scaled = amount * Decimal::from(10u64.pow(decimals as u32));
    scaled.trunc().try_into().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_min_amount_out() {
        assert_eq!(min_amount_out(dec!(100), dec!(0.01)), dec!(99));
        assert_eq!(min_amount_out(dec!(152.3), dec!(0)), dec!(152.3));
        assert_eq!(min_amount_out(dec!(50), dec!(1)), dec!(0));
    }

    #[test]
    fn test_to_base_units_asymmetric_decimals() {
        // 1.5 SOL at 9 decimals vs 1.5 USDC at 6 decimals.
        assert_eq!(to_base_units(dec!(1.5), 9), 1_500_000_000);
        assert_eq!(to_base_units(dec!(1.5), 6), 1_500_000);
    }

    #[test]
    fn test_to_base_units_truncates_dust() {
        // Anything below one base unit is dropped, not rounded up.
        assert_eq!(to_base_units(dec!(0.1234567891), 9), 123_456_789);
        assert_eq!(to_base_units(dec!(0.0000001), 6), 0);
    }
}
