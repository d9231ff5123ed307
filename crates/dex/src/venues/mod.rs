//! Venue adapter implementations.

pub mod meteora;
pub mod raydium;

pub use meteora::MeteoraVenue;
pub use raydium::RaydiumVenue;
