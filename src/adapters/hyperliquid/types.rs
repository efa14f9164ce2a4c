//! Hyperliquid Types
//!
//! Signed request envelope for `/exchange` and the connection bookkeeping
//! shared between the subscription client's receive loop and its heartbeat.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::actions::Action;

// =============================================================================
// Signature
// =============================================================================

/// ECDSA signature in the exchange's wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// `0x` + 64 hex chars
    pub r: String,
    /// `0x` + 64 hex chars
    pub s: String,
    /// 27 or 28
    pub v: u8,
}

fn u256_hex(value: U256) -> String {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

fn parse_u256(field: &str, value: &str) -> ExchangeResult<U256> {
    let hex_part = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(hex_part)
        .map_err(|e| ExchangeError::Signing(format!("Invalid signature {}: {}", field, e)))?;
    if bytes.len() != 32 {
        return Err(ExchangeError::Signing(format!(
            "Invalid signature {}: expected 32 bytes, got {}",
            field,
            bytes.len()
        )));
    }
    Ok(U256::from_big_endian(&bytes))
}

impl Signature {
    /// Convert from an ethers signature, normalizing `v` to 27/28
    pub fn from_ethers(sig: &ethers::types::Signature) -> ExchangeResult<Self> {
        let v = match sig.v {
            0 | 1 => sig.v + 27,
            27 | 28 => sig.v,
            other => {
                return Err(ExchangeError::Signing(format!(
                    "Invalid signature v value: {} (expected 0, 1, 27, or 28)",
                    other
                )))
            }
        };
        Ok(Self {
            r: u256_hex(sig.r),
            s: u256_hex(sig.s),
            v: v as u8,
        })
    }

    pub fn to_ethers(&self) -> ExchangeResult<ethers::types::Signature> {
        Ok(ethers::types::Signature {
            r: parse_u256("r", &self.r)?,
            s: parse_u256("s", &self.s)?,
            v: u64::from(self.v),
        })
    }

    /// Address that produced this signature over `hash`
    pub fn recover(&self, hash: [u8; 32]) -> ExchangeResult<Address> {
        self.to_ethers()?
            .recover(H256::from(hash))
            .map_err(|e| ExchangeError::Signing(format!("Signature recovery failed: {}", e)))
    }
}

// =============================================================================
// Signed request
// =============================================================================

/// Body posted to `/exchange`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub action: Action,
    pub nonce: u64,
    pub signature: Signature,
    /// Lowercase hex, always `null` for transfer actions
    pub vault_address: Option<String>,
    pub expires_after: Option<u64>,
}

impl SignedRequest {
    /// Assemble the envelope; transfer actions never carry a vault
    pub fn assemble(
        action: Action,
        nonce: u64,
        signature: Signature,
        vault_address: Option<Address>,
        expires_after: Option<u64>,
    ) -> Self {
        let vault_address = if action.is_transfer() {
            None
        } else {
            vault_address.map(|addr| format!("{:?}", addr))
        };
        Self {
            action,
            nonce,
            signature,
            vault_address,
            expires_after,
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle of the subscription socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closing,
    Closed,
}

/// Liveness bookkeeping shared by the receive loop and the heartbeat task
///
/// Timestamps are milliseconds since the client's monotonic origin, so they
/// follow tokio's clock (and its paused test clock).
#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    pub state: Arc<RwLock<ConnectionState>>,
    /// Any inbound frame
    pub last_receive: Arc<AtomicU64>,
    /// Last acknowledged ping
    pub last_ping: Arc<AtomicU64>,
    /// Consecutive reconnect attempts since the last successful connect
    pub attempts: Arc<AtomicU32>,
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            last_receive: Arc::new(AtomicU64::new(0)),
            last_ping: Arc::new(AtomicU64::new(0)),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "Connection state change");
            *state = next;
        }
    }

    /// Reset both liveness timestamps to `now_ms`
    pub fn touch_all(&self, now_ms: u64) {
        self.last_receive.store(now_ms, Ordering::Relaxed);
        self.last_ping.store(now_ms, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::hyperliquid::actions::{ScheduleCancel, UsdClassTransfer};
    use serde_json::json;

    fn dummy_signature() -> Signature {
        Signature {
            r: format!("0x{}", "11".repeat(32)),
            s: format!("0x{}", "22".repeat(32)),
            v: 27,
        }
    }

    fn vault() -> Address {
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
    }

    #[test]
    fn test_signed_request_serializes_nulls() {
        let request = SignedRequest::assemble(
            Action::ScheduleCancel(ScheduleCancel { time: Some(10) }),
            1_700_000_000_000,
            dummy_signature(),
            None,
            None,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "action": {"type": "scheduleCancel", "time": 10},
                "nonce": 1_700_000_000_000u64,
                "signature": {"r": dummy_signature().r, "s": dummy_signature().s, "v": 27},
                "vaultAddress": null,
                "expiresAfter": null
            })
        );
    }

    #[test]
    fn test_vault_kept_for_trading_actions() {
        let request = SignedRequest::assemble(
            Action::ScheduleCancel(ScheduleCancel { time: None }),
            1,
            dummy_signature(),
            Some(vault()),
            Some(99),
        );
        assert_eq!(
            request.vault_address.as_deref(),
            Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8")
        );
        assert_eq!(request.expires_after, Some(99));
    }

    #[test]
    fn test_vault_dropped_for_transfers() {
        let request = SignedRequest::assemble(
            Action::UsdClassTransfer(UsdClassTransfer {
                hyperliquid_chain: "Mainnet".into(),
                signature_chain_id: "0xa4b1".into(),
                amount: "5".into(),
                to_perp: false,
                nonce: 1,
            }),
            1,
            dummy_signature(),
            Some(vault()),
            None,
        );
        assert!(request.vault_address.is_none());
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["vaultAddress"].is_null());
    }

    #[test]
    fn test_signature_ethers_round_trip_normalizes_v() {
        let raw = ethers::types::Signature {
            r: U256::from(7u64),
            s: U256::from(9u64),
            v: 1,
        };
        let sig = Signature::from_ethers(&raw).unwrap();
        assert_eq!(sig.v, 28);
        assert_eq!(sig.r.len(), 66);
        assert!(sig.r.ends_with("07"));

        let back = sig.to_ethers().unwrap();
        assert_eq!(back.r, U256::from(7u64));
        assert_eq!(back.v, 28);
    }

    #[test]
    fn test_signature_rejects_bad_v() {
        let raw = ethers::types::Signature {
            r: U256::one(),
            s: U256::one(),
            v: 35,
        };
        assert!(Signature::from_ethers(&raw).is_err());
    }

    #[tokio::test]
    async fn test_connection_health_defaults() {
        let health = ConnectionHealth::default();
        assert_eq!(health.state().await, ConnectionState::Disconnected);
        health.set_state(ConnectionState::Connected).await;
        assert_eq!(health.state().await, ConnectionState::Connected);

        health.touch_all(42);
        assert_eq!(health.last_receive.load(Ordering::Relaxed), 42);
        assert_eq!(health.last_ping.load(Ordering::Relaxed), 42);
        assert_eq!(health.attempts(), 0);
    }
}
