//! Configuration types for the stream runner
//!
//! Loaded from YAML (see [`super::load_config`]) or assembled from
//! environment variables. Credentials never live here; they stay in the
//! environment and flow through `HyperliquidConfig`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::hyperliquid::config::{parse_address, Network};
use crate::adapters::shared::ReconnectConfig;
use crate::error::AppError;

use super::constants::DEFAULT_COINS;

// ============================================================================
// Configuration Structs
// ============================================================================

/// Backoff between reconnect attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    ReconnectConfig::default().initial_delay_ms
}

fn default_max_delay_ms() -> u64 {
    ReconnectConfig::default().max_delay_ms
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<&ReconnectSettings> for ReconnectConfig {
    fn from(settings: &ReconnectSettings) -> Self {
        ReconnectConfig {
            initial_delay_ms: settings.initial_delay_ms,
            max_delay_ms: settings.max_delay_ms,
        }
    }
}

/// What the `hl-stream` binary subscribes to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Overrides `HL_NETWORK` when set
    #[serde(default)]
    pub network: Option<Network>,
    /// Coins streamed on the `l2Book` channel
    #[serde(default)]
    pub coins: Vec<String>,
    /// Account for the user channels (`userEvents`, `userFills`, `orderUpdates`)
    #[serde(default)]
    pub user_address: Option<String>,
    /// Extra subscription objects, sent verbatim
    #[serde(default)]
    pub extra_subscriptions: Vec<Value>,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

impl StreamConfig {
    /// Build from `HL_COINS` (comma separated) and `HL_ADDRESS`
    pub fn from_env() -> Result<Self, AppError> {
        let coins = std::env::var("HL_COINS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let config = Self {
            network: None,
            coins,
            user_address: std::env::var("HL_ADDRESS")
                .ok()
                .filter(|a| !a.trim().is_empty()),
            extra_subscriptions: Vec::new(),
            reconnect: ReconnectSettings::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(coin) = self.coins.iter().find(|c| c.trim().is_empty()) {
            return Err(AppError::Config(format!(
                "Coin names cannot be empty (got {:?})",
                coin
            )));
        }

        if let Some(address) = &self.user_address {
            parse_address(address)?;
        }

        if let Some(index) = self.extra_subscriptions.iter().position(|s| !s.is_object()) {
            return Err(AppError::Config(format!(
                "extra_subscriptions[{}] must be a mapping",
                index
            )));
        }

        if self.reconnect.initial_delay_ms == 0 {
            return Err(AppError::Config(
                "reconnect.initial_delay_ms must be > 0".to_string(),
            ));
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(AppError::Config(format!(
                "reconnect.max_delay_ms ({}) must be >= initial_delay_ms ({})",
                self.reconnect.max_delay_ms, self.reconnect.initial_delay_ms
            )));
        }

        Ok(())
    }

    /// Coins to stream, falling back to the defaults
    pub fn effective_coins(&self) -> Vec<String> {
        if self.coins.is_empty() {
            DEFAULT_COINS.iter().map(|c| c.to_string()).collect()
        } else {
            self.coins.iter().map(|c| c.trim().to_uppercase()).collect()
        }
    }

    /// Subscription objects in the order they should be replayed:
    /// user channels, then books, then extras
    pub fn subscriptions(&self) -> Vec<Value> {
        let mut subs = Vec::new();
        if let Some(user) = &self.user_address {
            for channel in ["userEvents", "userFills", "orderUpdates"] {
                subs.push(json!({
                    "method": "subscribe",
                    "subscription": {"type": channel, "user": user},
                }));
            }
        }
        for coin in self.effective_coins() {
            subs.push(json!({
                "method": "subscribe",
                "subscription": {"type": "l2Book", "coin": coin},
            }));
        }
        subs.extend(self.extra_subscriptions.iter().cloned());
        subs
    }
}

// ============================================================================
// Tests
// ============================================================================
