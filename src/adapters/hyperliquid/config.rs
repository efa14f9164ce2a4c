//! Hyperliquid Configuration
//!
//! Network selection, endpoint resolution and credentials for the REST
//! transport and the WebSocket subscription client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};

// =============================================================================
// Constants
// =============================================================================

/// Mainnet REST base URL
pub const MAINNET_REST_URL: &str = "https://api.hyperliquid.xyz";
/// Testnet REST base URL
pub const TESTNET_REST_URL: &str = "https://api.hyperliquid-testnet.xyz";
/// Mainnet WebSocket URL
pub const MAINNET_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
/// Testnet WebSocket URL
pub const TESTNET_WS_URL: &str = "wss://api.hyperliquid-testnet.xyz/ws";

// =============================================================================
// Network
// =============================================================================

/// Target network; also selects the phantom-agent source when signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Fixed endpoint pair for this network
    pub fn endpoints(self) -> Endpoints {
        match self {
            Network::Mainnet => Endpoints {
                base_url: MAINNET_REST_URL.to_string(),
                ws_url: MAINNET_WS_URL.to_string(),
            },
            Network::Testnet => Endpoints {
                base_url: TESTNET_REST_URL.to_string(),
                ws_url: TESTNET_WS_URL.to_string(),
            },
        }
    }
}

impl FromStr for Network {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(ExchangeError::Config(format!(
                "Unknown network '{}' (expected mainnet or testnet)",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Resolved REST/WS base URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub ws_url: String,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Hyperliquid client
#[derive(Debug, Clone, Default)]
pub struct HyperliquidConfig {
    /// Network the client signs for
    pub network: Network,
    /// REST base URL (no trailing slash)
    pub base_url: String,
    /// WebSocket URL
    pub ws_url: String,
    /// Agent (API wallet) private key, hex with or without 0x
    pub private_key: Option<String>,
    /// Vault address to trade on behalf of
    pub vault_address: Option<String>,
    /// User address for user-scoped subscriptions and info queries
    pub user_address: Option<String>,
}

impl HyperliquidConfig {
    /// Configuration for `network` with its default endpoints and no credentials
    pub fn for_network(network: Network) -> Self {
        let endpoints = network.endpoints();
        Self {
            network,
            base_url: endpoints.base_url,
            ws_url: endpoints.ws_url,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// - `HL_NETWORK`: `mainnet` (default) or `testnet`
    /// - `HL_BASE_URL` / `HL_WS_URL`: override one endpoint each
    /// - `HL_PRIVATE_KEY`, `HL_VAULT_ADDRESS`, `HL_ADDRESS`: optional
    pub fn from_env() -> ExchangeResult<Self> {
        let network: Network = std::env::var("HL_NETWORK")
            .unwrap_or_else(|_| "mainnet".to_string())
            .parse()?;

        let mut config = Self::for_network(network);
        if let Some(base_url) = non_empty_env("HL_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(ws_url) = non_empty_env("HL_WS_URL") {
            config.ws_url = ws_url;
        }
        config.private_key = non_empty_env("HL_PRIVATE_KEY");
        config.vault_address = non_empty_env("HL_VAULT_ADDRESS");
        config.user_address = non_empty_env("HL_ADDRESS");

        config.validate()?;
        Ok(config)
    }

    /// Check addresses are well-formed 20-byte hex
    pub fn validate(&self) -> ExchangeResult<()> {
        if let Some(vault) = &self.vault_address {
            parse_address(vault)?;
        }
        if let Some(user) = &self.user_address {
            parse_address(user)?;
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a 0x-prefixed (or bare) 20-byte hex address
pub fn parse_address(address: &str) -> ExchangeResult<ethers::types::Address> {
    let hex_part = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(hex_part)
        .map_err(|e| ExchangeError::Config(format!("Invalid address '{}': {}", address, e)))?;
    if bytes.len() != 20 {
        return Err(ExchangeError::Config(format!(
            "Invalid address '{}': expected 20 bytes, got {}",
            address,
            bytes.len()
        )));
    }
    Ok(ethers::types::Address::from_slice(&bytes))
}
