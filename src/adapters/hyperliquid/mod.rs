//! Hyperliquid exchange adapter module
//!
//! Signed `/exchange` actions over REST and a resilient WebSocket
//! subscription client.

pub mod actions;
pub mod config;
pub mod metadata;
pub mod nonce;
pub mod orders;
pub mod rest;
pub mod signing;
pub mod types;
pub mod ws;

pub use actions::Action;
pub use config::{HyperliquidConfig, Network};
pub use metadata::{AssetMeta, MetadataResolver};
pub use nonce::NonceManager;
pub use orders::OrderSpec;
pub use rest::{ExchangeTransport, SubmitOptions};
pub use signing::{build_signer, ActionSigner, DelegatingSigner, LocalKeySigner, SignerConfig};
pub use types::{ConnectionState, Signature, SignedRequest};
pub use ws::{LivenessConfig, SubscriptionClient};
