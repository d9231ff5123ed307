//! Meteora venue adapter.
//!
//! Dynamic AMM pools addressed by a fixed per-pair pool map; pool state is
//! fetched over HTTP and quoted with constant-product math net of the
//! pool's trade fee.

use crate::error::{Error, Result};
use crate::router::{min_amount_out, to_base_units};
use crate::traits::Venue;
use crate::types::{QuoteRequest, SwapInstruction, SwapRequest, VenueQuote};
use async_trait::async_trait;
use base64::Engine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

const VENUE_NAME: &str = "meteora";

/// Meteora venue adapter over the dynamic AMM HTTP API.
pub struct MeteoraVenue {
    http_client: reqwest::Client,
    base_url: String,
    /// "mintA:mintB" (unordered pair) -> pool address.
    pools: HashMap<String, String>,
}

/// On-chain pool state as served by the API.
#[derive(Debug, Deserialize)]
struct PoolState {
    token_a_mint: String,
    token_b_mint: String,
    /// Reserve of token A, base units.
    token_a_amount: String,
    /// Reserve of token B, base units.
    token_b_amount: String,
    /// Trade fee in basis points.
    trade_fee_bps: u32,
}

/// Unsigned swap payload serialized into the opaque instruction.
#[derive(Debug, Serialize)]
struct MeteoraSwapPayload<'a> {
    pool: &'a str,
    wallet: &'a str,
    input_mint: &'a str,
    amount_in: u64,
    min_amount_out: u64,
}

/// Canonical unordered key for a mint pair.
fn pair_key(mint_a: &str, mint_b: &str) -> String {
    if mint_a <= mint_b {
        format!("{}:{}", mint_a, mint_b)
    } else {
        format!("{}:{}", mint_b, mint_a)
    }
}

/// Constant-product output: `in` whole units against whole-unit reserves,
/// with the trade fee charged on the input side.
fn constant_product_out(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee: Decimal,
) -> Option<Decimal> {
    if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
        return None;
    }
    let net_in = amount_in * (Decimal::ONE - fee);
    Some(reserve_out * net_in / (reserve_in + net_in))
}

impl MeteoraVenue {
    /// Create an adapter with the default mainnet pool map.
    pub fn new(base_url: impl Into<String>) -> Self {
        let sol = "So11111111111111111111111111111111111111112";
        let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        let usdt = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

        let mut pools = HashMap::new();
        pools.insert(
            pair_key(sol, usdc),
            "5CX2qVqPbBZuiDQHJKjqp4KBdkHzJYNHNjjNrKKzQaVs".to_string(),
        );
        pools.insert(
            pair_key(usdc, usdt),
            "EjfvJeP3f4XErYMAxs8BAeB8trE1KLy6YbxZQN4i6aRB".to_string(),
        );

        Self::with_pools(base_url, pools)
    }

    /// Create an adapter with an explicit pool map.
    pub fn with_pools(base_url: impl Into<String>, pools: HashMap<String, String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            pools,
        }
    }

    fn pool_address(&self, mint_in: &str, mint_out: &str) -> Result<&str> {
        self.pools
            .get(&pair_key(mint_in, mint_out))
            .map(String::as_str)
            .ok_or(Error::PoolNotFound { venue: VENUE_NAME })
    }

    async fn fetch_pool(&self, address: &str) -> Result<PoolState> {
        let url = format!("{}/pool/{}", self.base_url, address);
        let state: PoolState = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(state)
    }

    /// Quote a swap against fetched pool state, whole-unit in and out.
    fn quote_against_pool(
        state: &PoolState,
        req: &QuoteRequest,
    ) -> Result<(Decimal, Decimal)> {
        let reserve_a = Decimal::from_str(&state.token_a_amount)
            .map_err(|e| malformed(format!("token_a_amount: {}", e)))?;
        let reserve_b = Decimal::from_str(&state.token_b_amount)
            .map_err(|e| malformed(format!("token_b_amount: {}", e)))?;

        // Reserves arrive in base units; normalize to whole units so the
        // asymmetric-decimals case prices correctly.
        let (reserve_in_raw, reserve_out_raw) = if state.token_a_mint == req.token_in.address {
            (reserve_a, reserve_b)
        } else if state.token_b_mint == req.token_in.address {
            (reserve_b, reserve_a)
        } else {
            return Err(malformed("pool does not contain the input mint".to_string()));
        };
        let scale_in = Decimal::from(10u64.pow(req.token_in.decimals as u32));
        let scale_out = Decimal::from(10u64.pow(req.token_out.decimals as u32));
        let reserve_in = reserve_in_raw / scale_in;
        let reserve_out = reserve_out_raw / scale_out;

        let fee = Decimal::from(state.trade_fee_bps) / Decimal::from(10_000u32);
        let out = constant_product_out(req.amount_in, reserve_in, reserve_out, fee)
            .ok_or_else(|| malformed("pool has empty reserves".to_string()))?;

        // Impact relative to the marginal (spot) price.
        let spot_out = req.amount_in * reserve_out / reserve_in * (Decimal::ONE - fee);
        let price_impact = if spot_out.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE - out / spot_out
        };

        Ok((out, price_impact))
    }
}

fn malformed(message: String) -> Error {
    Error::VenueBuildError {
        venue: VENUE_NAME,
        message,
    }
}

#[async_trait]
impl Venue for MeteoraVenue {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    async fn quote(&self, req: &QuoteRequest) -> Result<VenueQuote> {
        let address = self.pool_address(&req.token_in.address, &req.token_out.address)?;
        let state = self.fetch_pool(address).await?;
        let (output_amount, price_impact) = Self::quote_against_pool(&state, req)?;

        debug!(
            "meteora quote: pool {} {} {} -> {} {}",
            address, req.amount_in, req.token_in.symbol, output_amount, req.token_out.symbol
        );

        Ok(VenueQuote {
            venue: VENUE_NAME.to_string(),
            output_amount,
            price_impact,
            fee: Decimal::from(state.trade_fee_bps) / Decimal::from(10_000u32),
        })
    }

    async fn build_swap(&self, req: &SwapRequest) -> Result<SwapInstruction> {
        let address = self
            .pool_address(&req.token_in.address, &req.token_out.address)?
            .to_string();
        let state = self.fetch_pool(&address).await?;

        let quote_req = QuoteRequest {
            token_in: req.token_in.clone(),
            token_out: req.token_out.clone(),
            amount_in: req.amount_in,
        };
        let (expected, _) = Self::quote_against_pool(&state, &quote_req)?;
        let min_out = min_amount_out(expected, req.slippage);

        let payload = MeteoraSwapPayload {
            pool: &address,
            wallet: &req.wallet_address,
            input_mint: &req.token_in.address,
            amount_in: to_base_units(req.amount_in, req.token_in.decimals),
            min_amount_out: to_base_units(min_out, req.token_out.decimals),
        };
        let bytes = serde_json::to_vec(&payload)?;

        Ok(SwapInstruction {
            venue: VENUE_NAME.to_string(),
            pool_id: address,
            transaction_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            min_amount_out: min_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TokenInfo;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("a", "b"), pair_key("b", "a"));
        assert_ne!(pair_key("a", "b"), pair_key("a", "c"));
    }

    #[test]
    fn test_constant_product_small_trade_near_spot() {
        // 1 in against deep 1000/100000 reserves, no fee: spot is 100 out.
        let out = constant_product_out(dec!(1), dec!(1000), dec!(100000), Decimal::ZERO).unwrap();
        assert!(out < dec!(100));
        assert!(out > dec!(99.8));
    }

    #[test]
    fn test_constant_product_fee_reduces_output() {
        let no_fee =
            constant_product_out(dec!(10), dec!(1000), dec!(1000), Decimal::ZERO).unwrap();
        let with_fee =
            constant_product_out(dec!(10), dec!(1000), dec!(1000), dec!(0.003)).unwrap();
        assert!(with_fee < no_fee);
    }

    #[test]
    fn test_empty_reserves_rejected() {
        assert!(constant_product_out(dec!(1), Decimal::ZERO, dec!(100), Decimal::ZERO).is_none());
    }

    #[test]
    fn test_quote_scales_asymmetric_decimals() {
        // 1000 SOL (9 decimals) vs 100_000 USDC (6 decimals), spot 100.
        let state = PoolState {
            token_a_mint: "sol-mint".to_string(),
            token_b_mint: "usdc-mint".to_string(),
            token_a_amount: "1000000000000".to_string(),
            token_b_amount: "100000000000".to_string(),
            trade_fee_bps: 0,
        };
        let req = QuoteRequest {
            token_in: TokenInfo {
                symbol: "SOL".to_string(),
                address: "sol-mint".to_string(),
                decimals: 9,
            },
            token_out: TokenInfo {
                symbol: "USDC".to_string(),
                address: "usdc-mint".to_string(),
                decimals: 6,
            },
            amount_in: dec!(1),
        };

        let (out, impact) = MeteoraVenue::quote_against_pool(&state, &req).unwrap();
        assert!(out > dec!(99.8) && out < dec!(100));
        assert!(impact > Decimal::ZERO && impact < dec!(0.01));
    }
}
