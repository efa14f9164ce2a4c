//! Hyperliquid Signing
//!
//! L1 action signing: the action is MessagePack-encoded, hashed together with
//! nonce, vault and expiry into a connection id, and that id is signed as an
//! EIP-712 `Agent` ("phantom agent") under the fixed `Exchange` domain.

use std::sync::Arc;

use ethers::abi::{encode, Token};
use ethers::core::utils::keccak256;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::actions::Action;
use super::config::Network;
use super::types::Signature;

// =============================================================================
// EIP-712 constants
// =============================================================================

pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const AGENT_TYPE: &str = "Agent(string source,bytes32 connectionId)";

/// Phantom-agent source: `a` on mainnet, `b` elsewhere
pub fn agent_source(network: Network) -> &'static str {
    if network.is_mainnet() {
        "a"
    } else {
        "b"
    }
}

// =============================================================================
// Hashing
// =============================================================================

/// Connection id for an action: keccak256 over
/// `msgpack(action) ‖ nonce_be ‖ vault_flag[‖ vault] [‖ 0x00 ‖ expiry_be]`
pub fn action_hash(
    action: &Action,
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> ExchangeResult<[u8; 32]> {
    let mut data = rmp_serde::to_vec_named(action)
        .map_err(|e| ExchangeError::Signing(format!("MessagePack encoding failed: {}", e)))?;

    data.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => data.push(0x00),
        Some(vault) => {
            data.push(0x01);
            data.extend_from_slice(vault.as_bytes());
        }
    }
    if let Some(expires_after) = expires_after {
        data.push(0x00);
        data.extend_from_slice(&expires_after.to_be_bytes());
    }

    Ok(keccak256(&data))
}

fn domain_separator() -> [u8; 32] {
    let encoded = encode(&[
        Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
        Token::FixedBytes(keccak256(EIP712_DOMAIN_NAME).to_vec()),
        Token::FixedBytes(keccak256(EIP712_DOMAIN_VERSION).to_vec()),
        Token::Uint(U256::from(EIP712_CHAIN_ID)),
        Token::Address(Address::zero()),
    ]);
    keccak256(&encoded)
}

/// Final EIP-712 digest for the phantom agent `{source, connection_id}`
pub fn agent_signing_hash(network: Network, connection_id: [u8; 32]) -> [u8; 32] {
    let struct_hash = keccak256(&encode(&[
        Token::FixedBytes(keccak256(AGENT_TYPE).to_vec()),
        Token::FixedBytes(keccak256(agent_source(network)).to_vec()),
        Token::FixedBytes(connection_id.to_vec()),
    ]));

    let mut data = Vec::with_capacity(66);
    data.push(0x19);
    data.push(0x01);
    data.extend_from_slice(&domain_separator());
    data.extend_from_slice(&struct_hash);
    keccak256(&data)
}

// =============================================================================
// Signer capability
// =============================================================================

/// Everything that goes into one L1 signature
#[derive(Debug, Clone, Copy)]
pub struct SigningPayload<'a> {
    pub action: &'a Action,
    pub nonce: u64,
    pub network: Network,
    pub vault_address: Option<Address>,
    pub expires_after: Option<u64>,
}

impl SigningPayload<'_> {
    /// Digest a key holder signs for this payload
    pub fn signing_hash(&self) -> ExchangeResult<[u8; 32]> {
        let connection_id = action_hash(
            self.action,
            self.nonce,
            self.vault_address,
            self.expires_after,
        )?;
        Ok(agent_signing_hash(self.network, connection_id))
    }
}

/// Produces signatures for L1 actions; performs no I/O
pub trait ActionSigner: Send + Sync {
    fn sign(&self, payload: &SigningPayload<'_>) -> ExchangeResult<Signature>;
}

/// Signs with an in-process private key
pub struct LocalKeySigner {
    wallet: LocalWallet,
}

impl LocalKeySigner {
    pub fn new(private_key: &str) -> ExchangeResult<Self> {
        let wallet: LocalWallet = private_key
            .trim()
            .parse()
            .map_err(|e| ExchangeError::Config(format!("Invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.wallet.address())
            .finish()
    }
}

impl ActionSigner for LocalKeySigner {
    fn sign(&self, payload: &SigningPayload<'_>) -> ExchangeResult<Signature> {
        let hash = payload.signing_hash()?;
        let signature = self
            .wallet
            .sign_hash(H256::from(hash))
            .map_err(|e| ExchangeError::Signing(format!("EIP-712 signing failed: {}", e)))?;
        Signature::from_ethers(&signature)
    }
}

/// External signing callback: `(action, nonce) -> signature`
pub type SignCallback = Arc<dyn Fn(&Action, u64) -> ExchangeResult<Signature> + Send + Sync>;

/// Hands signing to a caller-supplied callback (hardware wallet, remote signer)
pub struct DelegatingSigner {
    callback: SignCallback,
}

impl DelegatingSigner {
    pub fn new(callback: SignCallback) -> Self {
        Self { callback }
    }
}

impl ActionSigner for DelegatingSigner {
    fn sign(&self, payload: &SigningPayload<'_>) -> ExchangeResult<Signature> {
        (self.callback)(payload.action, payload.nonce)
    }
}

/// Explicit signer selection
#[derive(Clone, Default)]
pub struct SignerConfig {
    pub private_key: Option<String>,
    pub callback: Option<SignCallback>,
}

impl SignerConfig {
    pub fn with_private_key(private_key: impl Into<String>) -> Self {
        Self {
            private_key: Some(private_key.into()),
            callback: None,
        }
    }

    pub fn with_callback(callback: SignCallback) -> Self {
        Self {
            private_key: None,
            callback: Some(callback),
        }
    }
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Pick the signer: callback when present, else the private key
pub fn build_signer(config: &SignerConfig) -> ExchangeResult<Arc<dyn ActionSigner>> {
    if let Some(callback) = &config.callback {
        return Ok(Arc::new(DelegatingSigner::new(Arc::clone(callback))));
    }
    if let Some(key) = &config.private_key {
        return Ok(Arc::new(LocalKeySigner::new(key)?));
    }
    Err(ExchangeError::SigningUnavailable(
        "no private key or signing callback configured".into(),
    ))
}

/// Address that signed `payload`
pub fn recover_signer(payload: &SigningPayload<'_>, signature: &Signature) -> ExchangeResult<Address> {
    signature.recover(payload.signing_hash()?)
}
