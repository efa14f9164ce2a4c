//! Hyperliquid client toolkit
//!
//! - Signed REST transport: nonces, msgpack action hashing, EIP-712 agent signatures
//! - `/info` queries and asset metadata
//! - Subscription client with heartbeat, idle probing and reconnect/replay

pub mod adapters;
pub mod config;
pub mod error;

pub use error::AppError;
