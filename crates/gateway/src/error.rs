//! Error types for the gateway.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Client channel full or closed")]
    ChannelSend,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
