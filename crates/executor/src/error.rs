//! Error types for the executor service.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for executor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Executor errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No order record with the given id.
    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    /// Routing or build failure from the DEX layer.
    #[error(transparent)]
    Dex(#[from] dex::Error),

    /// State machine or token validation failure.
    #[error(transparent)]
    Order(#[from] common::Error),

    /// Transaction submission or confirmation failed.
    #[error("Settlement failed: {0}")]
    Settlement(String),

    /// Redelivery attempts for a job are exhausted.
    #[error("Order processing retries exhausted")]
    QueueExhausted,

    /// Order store failure.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Queue / status channel failure.
    #[error("NATS error: {0}")]
    Nats(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error is an infrastructure fault worth a queue retry,
    /// as opposed to a business failure that terminates the order.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Redis(_) | Error::Nats(_))
    }
}
