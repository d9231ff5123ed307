//! Error types for DEX routing.

use thiserror::Error;

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Routing and venue errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Every configured venue failed to produce a quote.
    #[error("No valid quotes available from any DEX")]
    NoLiquidityAvailable,

    /// The venue has no liquidity pool for the requested pair.
    #[error("No {venue} pool found for this token pair")]
    PoolNotFound { venue: &'static str },

    /// A venue's quote or build call failed.
    #[error("{venue} swap failed: {message}")]
    VenueBuildError { venue: &'static str, message: String },

    /// Routing asked for a venue that is not registered.
    #[error("Unknown venue: {0}")]
    UnknownVenue(String),

    /// Token registry rejected a symbol or pair.
    #[error(transparent)]
    Token(#[from] common::Error),

    /// HTTP transport failure talking to a venue.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Decimal parse error.
    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}
