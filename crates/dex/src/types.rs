//! Common types for venue quoting and routing decisions.

use common::TokenInfo;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inputs for a quote request against one or more venues.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    /// Input amount in whole-token units.
    pub amount_in: Decimal,
}

/// Inputs for building a swap transaction on a chosen venue.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    /// Already-validated settlement wallet address.
    pub wallet_address: String,
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    /// Input amount in whole-token units.
    pub amount_in: Decimal,
    /// Acceptable slippage as a fraction in [0, 1].
    pub slippage: Decimal,
}

/// A single venue's price for a pair. Ephemeral, never persisted standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueQuote {
    /// Quoting venue name.
    pub venue: String,
    /// Quoted output in whole output-token units.
    pub output_amount: Decimal,
    /// Estimated price impact as a fraction.
    pub price_impact: Decimal,
    /// Venue fee as a fraction of input.
    pub fee: Decimal,
}

/// Per-venue result collected by the aggregator, failures included.
#[derive(Debug, Clone, Serialize)]
pub struct VenueOutcome {
    pub venue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<VenueQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The aggregator's routing decision: the winning venue plus the full
/// outcome set for observability, carrying the quoted pair so `prepare`
/// needs nothing beyond the decision itself.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Venue with the greatest quoted output.
    pub selected_venue: String,
    /// The winning quote's output in whole output-token units.
    pub output_amount: Decimal,
    /// Every venue's outcome, including failures.
    pub outcomes: Vec<VenueOutcome>,
    /// The pair and amount this decision priced.
    #[serde(skip)]
    pub token_in: TokenInfo,
    #[serde(skip)]
    pub token_out: TokenInfo,
    pub amount_in: Decimal,
}

impl RoutingDecision {
    /// Venue name -> quoted output, for every venue that answered.
    pub fn quoted_amounts(&self) -> HashMap<String, Decimal> {
        self.outcomes
            .iter()
            .filter_map(|o| o.quote.as_ref().map(|q| (o.venue.clone(), q.output_amount)))
            .collect()
    }

    /// The winning quote.
    pub fn selected_quote(&self) -> Option<&VenueQuote> {
        self.outcomes
            .iter()
            .filter_map(|o| o.quote.as_ref())
            .find(|q| q.venue == self.selected_venue)
    }
}

/// Opaque unsigned settlement instruction bound to one venue's pool.
///
/// `transaction_base64` is the serialized unsigned transaction as the
/// settlement layer expects it; callers treat it as a black box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapInstruction {
    /// Venue the instruction is bound to.
    pub venue: String,
    /// Pool the swap executes against.
    pub pool_id: String,
    /// Serialized unsigned transaction, base64.
    pub transaction_base64: String,
    /// Slippage-bounded minimum acceptable output, whole output-token units.
    pub min_amount_out: Decimal,
}
