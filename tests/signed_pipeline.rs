//! End-to-end tests for the signed REST pipeline
//!
//! A mockito server echoes every `/exchange` body back, so each test can
//! recover the signer from exactly what went over the wire.
//!
//! # Running the tests
//! ```bash
//! cargo test --test signed_pipeline
//! ```

use std::sync::{Arc, Mutex};

use mockito::Matcher;
use serde_json::{json, Value};

use hyper_bot::adapters::hyperliquid::actions::{CancelWire, Grouping};
use hyper_bot::adapters::hyperliquid::signing::{recover_signer, SignCallback, SigningPayload};
use hyper_bot::adapters::hyperliquid::{
    Action, ActionSigner, DelegatingSigner, ExchangeTransport, HyperliquidConfig, LocalKeySigner,
    MetadataResolver, Network, NonceManager, OrderSpec, Signature,
};
use hyper_bot::adapters::ErrorKind;

// Hardhat test account #1
const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const VAULT: &str = "0x1111111111111111111111111111111111111111";

fn config_for(server: &mockito::Server) -> HyperliquidConfig {
    HyperliquidConfig {
        base_url: server.url(),
        ..HyperliquidConfig::for_network(Network::Testnet)
    }
}

async fn echo_exchange(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(|request| request.body().cloned().unwrap_or_default())
        .create_async()
        .await
}

/// Recover the signing address from an echoed request body
fn signer_of(body: &Value, network: Network) -> ethers::types::Address {
    let action: Action = serde_json::from_value(body["action"].clone()).unwrap();
    let signature: Signature = serde_json::from_value(body["signature"].clone()).unwrap();
    let vault_address = body["vaultAddress"]
        .as_str()
        .map(|v| v.parse().unwrap());
    let payload = SigningPayload {
        action: &action,
        nonce: body["nonce"].as_u64().unwrap(),
        network,
        vault_address,
        expires_after: body["expiresAfter"].as_u64(),
    };
    recover_signer(&payload, &signature).unwrap()
}

#[tokio::test]
async fn test_order_signed_with_local_key_recovers_to_agent() {
    let mut server = mockito::Server::new_async().await;
    let mock = echo_exchange(&mut server).await;

    let config = HyperliquidConfig {
        private_key: Some(TEST_KEY.to_string()),
        vault_address: Some(VAULT.to_string()),
        ..config_for(&server)
    };
    let nonces = Arc::new(NonceManager::new());
    let transport = ExchangeTransport::new(&config, Arc::clone(&nonces)).unwrap();

    let wire = hyper_bot::adapters::hyperliquid::orders::build_order(
        &OrderSpec::limit(0, true, 64000.0, 0.01),
        None,
        3,
    )
    .unwrap();
    let body = transport.place_orders(vec![wire], Grouping::Na).await.unwrap();

    assert_eq!(body["action"]["type"], "order");
    assert_eq!(body["nonce"].as_u64().unwrap(), nonces.last());
    assert_eq!(body["vaultAddress"], VAULT);

    let agent = LocalKeySigner::new(TEST_KEY).unwrap().address();
    assert_eq!(signer_of(&body, Network::Testnet), agent);
    // Same bytes signed for mainnet would recover to someone else
    assert_ne!(signer_of(&body, Network::Mainnet), agent);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_delegating_signer_sees_posted_nonce() {
    let mut server = mockito::Server::new_async().await;
    let mock = echo_exchange(&mut server).await;

    let inner = LocalKeySigner::new(TEST_KEY).unwrap();
    let agent = inner.address();
    let calls: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&calls);
    let callback: SignCallback = Arc::new(move |action: &Action, nonce: u64| {
        seen.lock().unwrap().push(nonce);
        inner.sign(&SigningPayload {
            action,
            nonce,
            network: Network::Testnet,
            vault_address: None,
            expires_after: None,
        })
    });

    let transport = ExchangeTransport::new(&config_for(&server), Arc::new(NonceManager::new()))
        .unwrap()
        .with_signer(Arc::new(DelegatingSigner::new(callback)));

    let body = transport
        .cancel(vec![CancelWire { asset: 3, oid: 42 }])
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![body["nonce"].as_u64().unwrap()]);
    assert_eq!(body["vaultAddress"], Value::Null);
    assert_eq!(signer_of(&body, Network::Testnet), agent);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_metadata_drives_rounded_order() {
    let mut server = mockito::Server::new_async().await;
    let info = server
        .mock("POST", "/info")
        .match_body(Matcher::PartialJson(json!({"type": "metaAndAssetCtxs"})))
        .with_status(200)
        .with_body(
            r#"[{"universe": [{"name": "BTC", "szDecimals": 5}, {"name": "ETH", "szDecimals": 4, "pxDecimals": 1}]},
                [{"midPx": "64000.0"}, {"midPx": "3100.0"}]]"#,
        )
        .expect(1)
        .create_async()
        .await;
    let exchange = echo_exchange(&mut server).await;

    let config = HyperliquidConfig {
        private_key: Some(TEST_KEY.to_string()),
        ..config_for(&server)
    };
    let transport = Arc::new(ExchangeTransport::new(&config, Arc::new(NonceManager::new())).unwrap());
    let resolver = MetadataResolver::new(Arc::clone(&transport));

    let eth = resolver.require("eth").await.unwrap();
    assert_eq!(eth.asset_id, 1);
    let wire = eth
        .build_order(&OrderSpec::limit(eth.asset_id, false, 3100.27, 0.123456))
        .unwrap();
    let body = transport.place_orders(vec![wire], Grouping::Na).await.unwrap();

    let order = &body["action"]["orders"][0];
    assert_eq!(order["a"], 1);
    assert_eq!(order["b"], false);
    assert_eq!(order["p"], "3100.2");
    assert_eq!(order["s"], "0.1234");

    info.assert_async().await;
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_exchange_rejection_is_transport_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(r#"{"status": "err", "response": "Insufficient margin"}"#)
        .create_async()
        .await;

    let config = HyperliquidConfig {
        private_key: Some(TEST_KEY.to_string()),
        ..config_for(&server)
    };
    let transport = ExchangeTransport::new(&config, Arc::new(NonceManager::new())).unwrap();

    let err = transport.schedule_cancel(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("Insufficient margin"));
}
