//! Hyperliquid REST transport
//!
//! `/info` queries and signed `/exchange` submissions. Every signed call takes
//! its nonce from the shared [`NonceManager`], so several transports (or a
//! transport and an external signer) never reuse one.
//!
//! Docs: https://hyperliquid.gitbook.io/hyperliquid-docs/for-developers/api

use std::sync::Arc;

use ethers::types::Address;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::config::constants::http_timeout;

use super::actions::{
    Action, BulkCancel, BulkCancelCloid, BulkOrder, CancelCloidWire, CancelWire, Grouping,
    OrderWire, ScheduleCancel,
};
use super::config::{parse_address, HyperliquidConfig, Network};
use super::nonce::NonceManager;
use super::signing::{build_signer, ActionSigner, SignerConfig, SigningPayload};
use super::types::SignedRequest;

/// Default row limit for `fundingHistory`
pub const DEFAULT_FUNDING_HISTORY_LIMIT: u32 = 168;

/// Per-call overrides for a signed submission
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitOptions {
    /// Sign for this network instead of the configured one
    pub network: Option<Network>,
    /// Reject the action on the exchange after this UTC ms timestamp
    pub expires_after: Option<u64>,
}

/// HTTP client for `/info` and `/exchange`
pub struct ExchangeTransport {
    http: reqwest::Client,
    base_url: String,
    network: Network,
    vault_address: Option<Address>,
    signer: Option<Arc<dyn ActionSigner>>,
    nonces: Arc<NonceManager>,
}

impl ExchangeTransport {
    /// Transport for `config`; signs with `config.private_key` when one is set
    pub fn new(config: &HyperliquidConfig, nonces: Arc<NonceManager>) -> ExchangeResult<Self> {
        let signer_config = SignerConfig {
            private_key: config.private_key.clone(),
            callback: None,
        };
        Self::with_signer_config(config, nonces, &signer_config)
    }

    /// Transport whose signer is picked by [`build_signer`]
    ///
    /// A `signer_config` with neither key nor callback yields a read-only
    /// transport: `/info` works, signed calls fail with `SigningUnavailable`.
    pub fn with_signer_config(
        config: &HyperliquidConfig,
        nonces: Arc<NonceManager>,
        signer_config: &SignerConfig,
    ) -> ExchangeResult<Self> {
        let vault_address = config
            .vault_address
            .as_deref()
            .map(parse_address)
            .transpose()?;

        let signer = match build_signer(signer_config) {
            Ok(signer) => Some(signer),
            Err(ExchangeError::SigningUnavailable(_)) => None,
            Err(e) => return Err(e),
        };

        let http = reqwest::Client::builder()
            .timeout(http_timeout())
            .build()
            .map_err(|e| ExchangeError::Config(format!("HTTP client build failed: {}", e)))?;

        tracing::info!(
            phase = "init",
            network = %config.network,
            base_url = %config.base_url,
            timeout_s = http_timeout().as_secs(),
            has_signer = signer.is_some(),
            has_vault = vault_address.is_some(),
            "Hyperliquid REST transport configured"
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            network: config.network,
            vault_address,
            signer,
            nonces,
        })
    }

    /// Replace the signer (e.g. with a [`super::signing::DelegatingSigner`])
    pub fn with_signer(mut self, signer: Arc<dyn ActionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn nonces(&self) -> &Arc<NonceManager> {
        &self.nonces
    }

    fn signer(&self) -> ExchangeResult<&Arc<dyn ActionSigner>> {
        self.signer.as_ref().ok_or_else(|| {
            ExchangeError::SigningUnavailable(
                "set a private key or a signing callback before submitting actions".into(),
            )
        })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ExchangeResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ExchangeError::Request(format!("POST {} failed: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::Request(format!("Reading {} response failed: {}", path, e)))?;

        if !status.is_success() {
            return Err(ExchangeError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ExchangeError::InvalidResponse(format!("{} returned non-JSON body: {}", path, e))
        })
    }

    // =========================================================================
    // /info
    // =========================================================================

    /// POST `{query: payload}`; on an HTTP error status retry once as
    /// `{"type": query, ...payload}`
    pub async fn info(&self, query: &str, payload: Option<Map<String, Value>>) -> ExchangeResult<Value> {
        let payload = payload.filter(|p| !p.is_empty());

        let mut primary = Map::new();
        primary.insert(
            query.to_string(),
            payload.clone().map(Value::Object).unwrap_or(Value::Null),
        );

        match self.post_json("/info", &primary).await {
            Err(ExchangeError::Http { status, .. }) => {
                tracing::debug!(query, status, "/info rejected keyed shape, retrying typed shape");
                let mut typed = Map::new();
                typed.insert("type".to_string(), Value::String(query.to_string()));
                if let Some(payload) = payload {
                    typed.extend(payload);
                }
                self.post_json("/info", &typed).await
            }
            other => other,
        }
    }

    pub async fn meta_and_asset_ctxs(&self) -> ExchangeResult<Value> {
        self.info("metaAndAssetCtxs", None).await
    }

    pub async fn candle_snapshot(&self, coin: &str, interval: &str) -> ExchangeResult<Value> {
        let mut payload = Map::new();
        payload.insert("symbol".into(), Value::from(coin));
        payload.insert("interval".into(), Value::from(interval));
        self.info("candleSnapshot", Some(payload)).await
    }

    pub async fn user_funding(&self, address: &str) -> ExchangeResult<Value> {
        let mut payload = Map::new();
        payload.insert("address".into(), Value::from(address));
        self.info("userFunding", Some(payload)).await
    }

    pub async fn funding_history(&self, coin: &str, limit: Option<u32>) -> ExchangeResult<Value> {
        let mut payload = Map::new();
        payload.insert("symbol".into(), Value::from(coin));
        payload.insert(
            "limit".into(),
            Value::from(limit.unwrap_or(DEFAULT_FUNDING_HISTORY_LIMIT)),
        );
        self.info("fundingHistory", Some(payload)).await
    }

    // =========================================================================
    // /exchange
    // =========================================================================

    /// Sign `action` with a fresh nonce and post it
    pub async fn submit(&self, action: Action, options: SubmitOptions) -> ExchangeResult<Value> {
        let signer = self.signer()?;
        let nonce = self.nonces.next();
        self.sign_and_post(signer.as_ref(), action, nonce, options).await
    }

    /// Sign `action` with a caller-supplied nonce
    ///
    /// The nonce must be inside the exchange's validity window and must not
    /// have been issued or observed already; it is recorded before posting.
    pub async fn submit_with_nonce(
        &self,
        action: Action,
        nonce: u64,
        options: SubmitOptions,
    ) -> ExchangeResult<Value> {
        let signer = self.signer()?;
        if !self.nonces.within_valid_window(nonce) {
            return Err(ExchangeError::Nonce(format!(
                "{} is outside the accepted window around {}",
                nonce,
                self.nonces.now_ms()
            )));
        }
        if !self.nonces.claim(nonce) {
            return Err(ExchangeError::Nonce(format!("{} was already used", nonce)));
        }
        self.sign_and_post(signer.as_ref(), action, nonce, options).await
    }

    async fn sign_and_post(
        &self,
        signer: &dyn ActionSigner,
        action: Action,
        nonce: u64,
        options: SubmitOptions,
    ) -> ExchangeResult<Value> {
        let network = options.network.unwrap_or(self.network);
        let vault_address = if action.is_transfer() {
            None
        } else {
            self.vault_address
        };

        let signature = signer.sign(&SigningPayload {
            action: &action,
            nonce,
            network,
            vault_address,
            expires_after: options.expires_after,
        })?;

        let request =
            SignedRequest::assemble(action, nonce, signature, vault_address, options.expires_after);

        tracing::debug!(
            action = request.action.kind(),
            nonce,
            network = %network,
            vault = request.vault_address.as_deref().unwrap_or("none"),
            "POST /exchange"
        );

        let response = self.post_json("/exchange", &request).await?;
        check_exchange_status(response)
    }

    pub async fn place_orders(&self, orders: Vec<OrderWire>, grouping: Grouping) -> ExchangeResult<Value> {
        self.submit(
            Action::Order(BulkOrder { orders, grouping }),
            SubmitOptions::default(),
        )
        .await
    }

    pub async fn cancel(&self, cancels: Vec<CancelWire>) -> ExchangeResult<Value> {
        self.submit(Action::Cancel(BulkCancel { cancels }), SubmitOptions::default())
            .await
    }

    pub async fn cancel_by_cloid(&self, cancels: Vec<CancelCloidWire>) -> ExchangeResult<Value> {
        self.submit(
            Action::CancelByCloid(BulkCancelCloid { cancels }),
            SubmitOptions::default(),
        )
        .await
    }

    /// Schedule a cancel-all at `deadline_ms` (UTC); `None` clears it
    pub async fn schedule_cancel(&self, deadline_ms: Option<u64>) -> ExchangeResult<Value> {
        self.submit(
            Action::ScheduleCancel(ScheduleCancel { time: deadline_ms }),
            SubmitOptions::default(),
        )
        .await
    }

    /// Schedule a cancel-all `secs` seconds from now
    pub async fn schedule_cancel_in(&self, secs: u64) -> ExchangeResult<Value> {
        let deadline = self.nonces.now_ms().saturating_add(secs.saturating_mul(1000));
        self.schedule_cancel(Some(deadline)).await
    }
}

/// A 200 answer can still carry `{"status": "err", "response": "..."}`
fn check_exchange_status(response: Value) -> ExchangeResult<Value> {
    if response.get("status").and_then(Value::as_str) == Some("err") {
        let reason = match response.get("response") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => response.to_string(),
        };
        return Err(ExchangeError::Rejected(reason));
    }
    Ok(response)
}
