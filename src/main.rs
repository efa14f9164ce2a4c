//! hl-stream: subscribe to Hyperliquid channels and log every message
//!
//! 1. Loads `.env`, initialises logging
//! 2. Reads credentials/endpoints from `HL_*` variables
//! 3. Reads the stream definition from `$HL_CONFIG` (YAML) or `HL_COINS`/`HL_ADDRESS`
//! 4. Runs the subscription client until Ctrl+C

use std::path::Path;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use hyper_bot::adapters::hyperliquid::{HyperliquidConfig, SubscriptionClient};
use hyper_bot::adapters::shared::ReconnectConfig;
use hyper_bot::config::{self, constants::CONFIG_PATH_ENV, StreamConfig};

fn load_stream_config() -> anyhow::Result<StreamConfig> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            info!(path = %path, "Loading stream configuration");
            config::load_config(Path::new(&path)).context("loading stream configuration")
        }
        _ => StreamConfig::from_env().context("reading stream configuration from environment"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    config::logging::init_logging();

    let stream = match load_stream_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Configuration failed");
            std::process::exit(1);
        }
    };

    let mut exchange = HyperliquidConfig::from_env().context("reading HL_* environment")?;
    if let Some(network) = stream.network.filter(|n| *n != exchange.network) {
        let endpoints = network.endpoints();
        exchange.network = network;
        exchange.base_url = endpoints.base_url;
        exchange.ws_url = endpoints.ws_url;
    }

    let mut client = SubscriptionClient::from_config(&exchange)
        .with_backoff(ReconnectConfig::from(&stream.reconnect));
    for subscription in stream.subscriptions() {
        client.add_raw_subscription(subscription)?;
    }
    info!(
        network = %exchange.network,
        url = %exchange.ws_url,
        subscriptions = client.subscriptions().len(),
        "Starting stream"
    );

    let shutdown = client.shutdown_token();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                shutdown.cancel();
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for Ctrl+C signal");
            }
        }
    });

    client
        .run(|message| async move {
            let channel = message
                .get("channel")
                .and_then(|c| c.as_str())
                .unwrap_or("unknown")
                .to_string();
            info!(channel = %channel, data = %message, "Message");
        })
        .await;

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
