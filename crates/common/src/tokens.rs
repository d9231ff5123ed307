//! Token registry: symbol -> on-chain address and decimal precision.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Resolved token details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Canonical uppercase symbol.
    pub symbol: String,
    /// Mint address on chain.
    pub address: String,
    /// Decimal precision of the token's base units.
    pub decimals: u8,
}

/// Pure symbol/address lookup. No I/O, no state beyond the table.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    by_symbol: HashMap<String, TokenInfo>,
}

impl TokenRegistry {
    /// Registry preloaded with the supported mainnet tokens.
    pub fn mainnet() -> Self {
        Self::from_tokens([
            TokenInfo {
                symbol: "SOL".to_string(),
                address: "So11111111111111111111111111111111111111112".to_string(),
                decimals: 9,
            },
            TokenInfo {
                symbol: "USDC".to_string(),
                address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
                decimals: 6,
            },
            TokenInfo {
                symbol: "USDT".to_string(),
                address: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string(),
                decimals: 6,
            },
        ])
    }

    /// Build a registry from an explicit token set.
    pub fn from_tokens(tokens: impl IntoIterator<Item = TokenInfo>) -> Self {
        let by_symbol = tokens
            .into_iter()
            .map(|t| (t.symbol.clone(), t))
            .collect();
        Self { by_symbol }
    }

    /// Resolve a symbol (case-insensitive) to its token details.
    pub fn resolve(&self, symbol: &str) -> Result<&TokenInfo> {
        self.by_symbol
            .get(&symbol.to_uppercase())
            .ok_or_else(|| Error::UnknownToken(symbol.to_string()))
    }

    /// Decimal precision for a known mint address.
    pub fn decimals(&self, address: &str) -> Option<u8> {
        self.by_symbol
            .values()
            .find(|t| t.address == address)
            .map(|t| t.decimals)
    }

    /// Validate a swap pair: both symbols known, in != out.
    pub fn validate_pair(&self, token_in: &str, token_out: &str) -> Result<()> {
        if token_in.eq_ignore_ascii_case(token_out) {
            return Err(Error::InvalidTokenPair);
        }
        self.resolve(token_in)?;
        self.resolve(token_out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_symbol() {
        let registry = TokenRegistry::mainnet();
        let sol = registry.resolve("SOL").unwrap();
        assert_eq!(sol.decimals, 9);
        assert_eq!(
            sol.address,
            "So11111111111111111111111111111111111111112"
        );
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = TokenRegistry::mainnet();
        assert!(registry.resolve("usdc").is_ok());
        assert!(registry.resolve("Usdt").is_ok());
    }

    #[test]
    fn test_unknown_symbol_fails() {
        let registry = TokenRegistry::mainnet();
        assert!(matches!(
            registry.resolve("DOGE"),
            Err(Error::UnknownToken(_))
        ));
    }

    #[test]
    fn test_decimals_by_address() {
        let registry = TokenRegistry::mainnet();
        let usdc = registry.resolve("USDC").unwrap().address.clone();
        assert_eq!(registry.decimals(&usdc), Some(6));
        assert_eq!(registry.decimals("unknown-mint"), None);
    }

    #[test]
    fn test_validate_pair() {
        let registry = TokenRegistry::mainnet();
        assert!(registry.validate_pair("SOL", "USDC").is_ok());
        assert!(matches!(
            registry.validate_pair("SOL", "sol"),
            Err(Error::InvalidTokenPair)
        ));
        assert!(matches!(
            registry.validate_pair("SOL", "DOGE"),
            Err(Error::UnknownToken(_))
        ));
    }
}
