//! Exchange adapters
//!
//! Hyperliquid REST/WebSocket client plus the connection helpers it is
//! built on.

pub mod errors;
pub mod hyperliquid;
pub mod shared;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use errors::{ErrorKind, ExchangeError, ExchangeResult};
pub use hyperliquid::{
    ExchangeTransport, HyperliquidConfig, Network, NonceManager, SubscriptionClient,
};
