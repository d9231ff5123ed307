//! Concurrent multi-venue quote aggregation.
//!
//! Fans one quote request out to every configured venue, collects all
//! completions regardless of individual failure, and selects the quote
//! with the greatest output. Read-only: the decision is logged for audit
//! but order state is the worker's job.

use crate::error::{Error, Result};
use crate::traits::Venue;
use crate::types::{QuoteRequest, RoutingDecision, VenueOutcome};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Aggregates quotes across a fixed, ordered set of venues.
///
/// Venue order doubles as tie-break priority: when two venues quote the
/// exact same output, the one configured first wins, keeping routing
/// decisions reproducible for the same input snapshot.
pub struct QuoteAggregator {
    venues: Vec<Arc<dyn Venue>>,
}

impl QuoteAggregator {
    /// Create an aggregator over the given venues, in priority order.
    pub fn new(venues: Vec<Arc<dyn Venue>>) -> Self {
        Self { venues }
    }

    /// Registered venue names, in priority order.
    pub fn venue_names(&self) -> Vec<&'static str> {
        self.venues.iter().map(|v| v.name()).collect()
    }

    /// Look up a venue by name.
    pub fn venue(&self, name: &str) -> Option<Arc<dyn Venue>> {
        self.venues.iter().find(|v| v.name() == name).cloned()
    }

    /// Quote every venue concurrently and pick the best output.
    ///
    /// No short-circuit: every request runs to completion and failures are
    /// recorded in the decision's outcome set. Fails with
    /// `NoLiquidityAvailable` only when zero venues produced a quote.
    pub async fn best_quote(&self, req: &QuoteRequest) -> Result<RoutingDecision> {
        let futures = self.venues.iter().map(|venue| {
            let venue = venue.clone();
            async move {
                let name = venue.name();
                match venue.quote(req).await {
                    Ok(quote) => VenueOutcome {
                        venue: name.to_string(),
                        quote: Some(quote),
                        error: None,
                    },
                    Err(e) => {
                        warn!("{} quote failed: {}", name, e);
                        VenueOutcome {
                            venue: name.to_string(),
                            quote: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });

        let outcomes: Vec<VenueOutcome> = join_all(futures).await;

        // Outcomes are in configured priority order; strictly-greater keeps
        // the earlier venue on an exact tie.
        let mut best: Option<(&str, rust_decimal::Decimal)> = None;
        for outcome in &outcomes {
            if let Some(quote) = &outcome.quote {
                match best {
                    Some((_, current)) if quote.output_amount <= current => {}
                    _ => best = Some((&outcome.venue, quote.output_amount)),
                }
            }
        }

        let (venue, output_amount) = best.ok_or(Error::NoLiquidityAvailable)?;
        let selected_venue = venue.to_string();

        info!(
            "DEX routing decision: {} at {} ({} of {} venues quoted)",
            selected_venue,
            output_amount,
            outcomes.iter().filter(|o| o.quote.is_some()).count(),
            outcomes.len()
        );

        Ok(RoutingDecision {
            selected_venue,
            output_amount,
            outcomes,
            token_in: req.token_in.clone(),
            token_out: req.token_out.clone(),
            amount_in: req.amount_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SwapInstruction, SwapRequest, VenueQuote};
    use async_trait::async_trait;
    use common::TokenInfo;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Test venue returning a canned quote or failure.
    struct FakeVenue {
        name: &'static str,
        quote: std::result::Result<Decimal, &'static str>,
    }

    #[async_trait]
    impl Venue for FakeVenue {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn quote(&self, _req: &QuoteRequest) -> Result<VenueQuote> {
            match &self.quote {
                Ok(amount) => Ok(VenueQuote {
                    venue: self.name.to_string(),
                    output_amount: *amount,
                    price_impact: Decimal::ZERO,
                    fee: dec!(0.0025),
                }),
                Err(_) => Err(Error::PoolNotFound { venue: self.name }),
            }
        }

        async fn build_swap(&self, _req: &SwapRequest) -> Result<SwapInstruction> {
            unimplemented!("not exercised by aggregator tests")
        }
    }

    fn token(symbol: &str, decimals: u8) -> TokenInfo {
        TokenInfo {
            symbol: symbol.to_string(),
            address: format!("{}-mint", symbol.to_lowercase()),
            decimals,
        }
    }

    fn request() -> QuoteRequest {
        QuoteRequest {
            token_in: token("SOL", 9),
            token_out: token("USDC", 6),
            amount_in: dec!(1.5),
        }
    }

    fn aggregator(
        venues: Vec<(&'static str, std::result::Result<Decimal, &'static str>)>,
    ) -> QuoteAggregator {
        QuoteAggregator::new(
            venues
                .into_iter()
                .map(|(name, quote)| Arc::new(FakeVenue { name, quote }) as Arc<dyn Venue>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_selects_greatest_output() {
        let agg = aggregator(vec![
            ("raydium", Ok(dec!(150.0))),
            ("meteora", Ok(dec!(152.3))),
        ]);

        let decision = agg.best_quote(&request()).await.unwrap();
        assert_eq!(decision.selected_venue, "meteora");
        assert_eq!(decision.output_amount, dec!(152.3));
        assert_eq!(decision.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_single_success_is_selected() {
        let agg = aggregator(vec![
            ("raydium", Err("no pool")),
            ("meteora", Ok(dec!(99.9))),
        ]);

        let decision = agg.best_quote(&request()).await.unwrap();
        assert_eq!(decision.selected_venue, "meteora");
        assert_eq!(decision.output_amount, dec!(99.9));

        // The failure is recorded for observability.
        let raydium = decision
            .outcomes
            .iter()
            .find(|o| o.venue == "raydium")
            .unwrap();
        assert!(raydium.quote.is_none());
        assert!(raydium.error.is_some());
    }

    #[tokio::test]
    async fn test_all_failures_is_no_liquidity() {
        let agg = aggregator(vec![
            ("raydium", Err("no pool")),
            ("meteora", Err("no pool")),
        ]);

        let err = agg.best_quote(&request()).await.unwrap_err();
        assert!(matches!(err, Error::NoLiquidityAvailable));
    }

    #[tokio::test]
    async fn test_exact_tie_prefers_configured_order() {
        let agg = aggregator(vec![
            ("raydium", Ok(dec!(100))),
            ("meteora", Ok(dec!(100))),
        ]);
        let decision = agg.best_quote(&request()).await.unwrap();
        assert_eq!(decision.selected_venue, "raydium");

        // Same amounts, reversed priority.
        let agg = aggregator(vec![
            ("meteora", Ok(dec!(100))),
            ("raydium", Ok(dec!(100))),
        ]);
        let decision = agg.best_quote(&request()).await.unwrap();
        assert_eq!(decision.selected_venue, "meteora");
    }

    #[tokio::test]
    async fn test_quoted_amounts_excludes_failures() {
        let agg = aggregator(vec![
            ("raydium", Err("down")),
            ("meteora", Ok(dec!(42))),
        ]);
        let decision = agg.best_quote(&request()).await.unwrap();
        let amounts = decision.quoted_amounts();
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts.get("meteora"), Some(&dec!(42)));
    }
}
