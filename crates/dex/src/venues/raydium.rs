//! Raydium venue adapter.
//!
//! Quotes and builds against Raydium's pool API: pools are discovered by
//! mint pair, standard AMM pools only, and the deepest pool (by TVL) wins.
//! The pool price is the quote/base ratio, so output depends on which side
//! of the pool the input token sits on.

use crate::error::{Error, Result};
use crate::router::{min_amount_out, to_base_units};
use crate::traits::Venue;
use crate::types::{QuoteRequest, SwapInstruction, SwapRequest, VenueQuote};
use async_trait::async_trait;
use base64::Engine;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

const VENUE_NAME: &str = "raydium";

/// Swap fee applied by standard AMM pools (0.25%).
const POOL_FEE: Decimal = dec!(0.0025);

/// Raydium venue adapter over the public pool API.
pub struct RaydiumVenue {
    http_client: reqwest::Client,
    base_url: String,
}

/// Pool discovery response.
#[derive(Debug, Deserialize)]
struct PoolsByMintResponse {
    data: Vec<PoolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolInfo {
    id: String,
    #[serde(rename = "type")]
    pool_type: String,
    /// Quote-per-base price as reported by the API.
    price: String,
    tvl: String,
    #[serde(rename = "mintA")]
    mint_a: MintInfo,
    #[serde(rename = "mintB")]
    mint_b: MintInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct MintInfo {
    address: String,
}

/// Unsigned swap payload serialized into the opaque instruction.
#[derive(Debug, Serialize)]
struct RaydiumSwapPayload<'a> {
    pool_id: &'a str,
    wallet: &'a str,
    input_mint: &'a str,
    output_mint: &'a str,
    amount_in: u64,
    min_amount_out: u64,
    fixed_side: &'static str,
}

impl RaydiumVenue {
    /// Create an adapter against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch pools for a mint pair and select the deepest standard pool.
    async fn find_pool(&self, mint_in: &str, mint_out: &str) -> Result<PoolInfo> {
        let url = format!(
            "{}/pools/info/mint?mint1={}&mint2={}",
            self.base_url, mint_in, mint_out
        );

        let response: PoolsByMintResponse = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Standard AMM pools only; concentrated pools need tick math the
        // builder does not speak.
        response
            .data
            .into_iter()
            .filter(|p| p.pool_type == "Standard")
            .max_by(|a, b| {
                let a_tvl = Decimal::from_str(&a.tvl).unwrap_or_default();
                let b_tvl = Decimal::from_str(&b.tvl).unwrap_or_default();
                a_tvl.cmp(&b_tvl)
            })
            .ok_or(Error::PoolNotFound { venue: VENUE_NAME })
    }

    /// Expected output for `amount_in` against a pool, before slippage.
    fn expected_output(pool: &PoolInfo, mint_in: &str, amount_in: Decimal) -> Result<Decimal> {
        let price = Decimal::from_str(&pool.price).map_err(|e| Error::VenueBuildError {
            venue: VENUE_NAME,
            message: format!("bad pool price: {}", e),
        })?;
        if price.is_zero() {
            return Err(Error::VenueBuildError {
                venue: VENUE_NAME,
                message: "pool reported zero price".to_string(),
            });
        }

        // price = quote per base; selling base multiplies, selling quote divides.
        let gross = if pool.mint_a.address == mint_in {
            amount_in * price
        } else {
            amount_in / price
        };
        Ok(gross * (Decimal::ONE - POOL_FEE))
    }
}

#[async_trait]
impl Venue for RaydiumVenue {
    fn name(&self) -> &'static str {
        VENUE_NAME
    }

    async fn quote(&self, req: &QuoteRequest) -> Result<VenueQuote> {
        let pool = self
            .find_pool(&req.token_in.address, &req.token_out.address)
            .await?;
        let output_amount = Self::expected_output(&pool, &req.token_in.address, req.amount_in)?;

        debug!(
            "raydium quote: pool {} {} {} -> {} {}",
            pool.id, req.amount_in, req.token_in.symbol, output_amount, req.token_out.symbol
        );

        Ok(VenueQuote {
            venue: VENUE_NAME.to_string(),
            output_amount,
            price_impact: Decimal::ZERO,
            fee: POOL_FEE,
        })
    }

    async fn build_swap(&self, req: &SwapRequest) -> Result<SwapInstruction> {
        let pool = self
            .find_pool(&req.token_in.address, &req.token_out.address)
            .await?;
        let expected = Self::expected_output(&pool, &req.token_in.address, req.amount_in)?;
        let min_out = min_amount_out(expected, req.slippage);

        let payload = RaydiumSwapPayload {
            pool_id: &pool.id,
            wallet: &req.wallet_address,
            input_mint: &req.token_in.address,
            output_mint: &req.token_out.address,
            amount_in: to_base_units(req.amount_in, req.token_in.decimals),
            min_amount_out: to_base_units(min_out, req.token_out.decimals),
            fixed_side: "in",
        };
        let bytes = serde_json::to_vec(&payload)?;

        Ok(SwapInstruction {
            venue: VENUE_NAME.to_string(),
            pool_id: pool.id,
            transaction_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            min_amount_out: min_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(price: &str, mint_a: &str, mint_b: &str) -> PoolInfo {
        PoolInfo {
            id: "pool-1".to_string(),
            pool_type: "Standard".to_string(),
            price: price.to_string(),
            tvl: "1000000".to_string(),
            mint_a: MintInfo {
                address: mint_a.to_string(),
            },
            mint_b: MintInfo {
                address: mint_b.to_string(),
            },
        }
    }

    #[test]
    fn test_output_selling_base_side() {
        // 1.5 SOL at 100 USDC/SOL, 0.25% fee.
        let p = pool("100", "sol-mint", "usdc-mint");
        let out = RaydiumVenue::expected_output(&p, "sol-mint", dec!(1.5)).unwrap();
        assert_eq!(out, dec!(150) * dec!(0.9975));
    }

    #[test]
    fn test_output_selling_quote_side() {
        // 150 USDC back through the same pool divides by the price.
        let p = pool("100", "sol-mint", "usdc-mint");
        let out = RaydiumVenue::expected_output(&p, "usdc-mint", dec!(150)).unwrap();
        assert_eq!(out, dec!(1.5) * dec!(0.9975));
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let p = pool("0", "sol-mint", "usdc-mint");
        let err = RaydiumVenue::expected_output(&p, "sol-mint", dec!(1)).unwrap_err();
        assert!(matches!(err, Error::VenueBuildError { .. }));
    }
}
