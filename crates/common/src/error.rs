//! Shared error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Token {0} not supported")]
    UnknownToken(String),

    #[error("Token input and output must be different")]
    InvalidTokenPair,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
