//! Gateway service: the subscription relay between the order status channel
//! and WebSocket subscribers.
//!
//! Workers publish `StatusUpdate` envelopes on NATS with no knowledge of
//! who is listening; the gateway maintains per-order subscriber groups and
//! forwards each update only to clients watching that order. There is no
//! replay - late subscribers get a snapshot of the order record instead.

pub mod client;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod ws_server;

pub use client::{ClientRegistry, ClientState};
pub use error::{GatewayError, Result};
pub use relay::{RelayConfig, StatusRelay};
