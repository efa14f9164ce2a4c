//! Hyperliquid subscription client
//!
//! One long-lived socket feeding a caller-supplied handler. The receive loop
//! owns the read half; the heartbeat task and the loop share the write half
//! through a mutex. Liveness failures never reach the handler: the client
//! tears the socket down, backs off, reconnects and replays every
//! subscription in registration order.
//!
//! Docs: https://hyperliquid.gitbook.io/hyperliquid-docs/for-developers/api/websocket

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::websocket::{decode_frame, send_json};
use crate::adapters::shared::{Connector, ReconnectConfig, TlsConnector, WsSink, WsSource};

use super::config::HyperliquidConfig;
use super::types::{ConnectionHealth, ConnectionState};

// =============================================================================
// Liveness timings
// =============================================================================

/// Longest wait for any inbound frame before probing with a ping
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);
/// Heartbeat check period
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
/// Silence after which the heartbeat pings
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(25);
/// Time allowed for a pong after a ping
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Liveness timings; defaults are the exchange contract values
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    pub receive_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub idle_threshold: Duration,
    pub ping_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            receive_timeout: RECEIVE_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            idle_threshold: IDLE_THRESHOLD,
            ping_timeout: PING_TIMEOUT,
        }
    }
}

fn ping_message() -> Value {
    json!({"method": "ping"})
}

fn is_pong(value: &Value) -> bool {
    value.get("channel").and_then(Value::as_str) == Some("pong")
}

fn elapsed_ms(origin: Instant) -> u64 {
    origin.elapsed().as_millis() as u64
}

/// What woke the receive loop
enum Wake {
    Frame(Message),
    Idle,
    Lost(ExchangeError),
    /// Heartbeat verdict about a socket that has since been replaced
    Stale,
    Shutdown,
}

/// What a single inbound frame turned out to be
enum Inbound {
    Data,
    Pong,
    Ignored,
}

/// Outcome of the idle ping probe
enum Probe {
    Alive,
    Lost(ExchangeError),
    Shutdown,
}

// =============================================================================
// SubscriptionClient
// =============================================================================

/// Resilient subscription socket
pub struct SubscriptionClient {
    url: String,
    connector: Arc<dyn Connector>,
    subscriptions: Vec<Value>,
    writer: Arc<Mutex<Option<WsSink>>>,
    reader: Option<WsSource>,
    health: ConnectionHealth,
    /// Origin for the liveness timestamps in `health`
    origin: Instant,
    /// Bumped on every pong; the heartbeat waits on it
    pong_tx: watch::Sender<u64>,
    /// Bumped by every successful `connect()`
    generation: Arc<AtomicU64>,
    shutdown: CancellationToken,
    backoff: ReconnectConfig,
    liveness: LivenessConfig,
}

impl SubscriptionClient {
    /// Client for `url` opening sockets through `connector`
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        let (pong_tx, _) = watch::channel(0);
        Self {
            url: url.into(),
            connector,
            subscriptions: Vec::new(),
            writer: Arc::new(Mutex::new(None)),
            reader: None,
            health: ConnectionHealth::new(),
            origin: Instant::now(),
            pong_tx,
            generation: Arc::new(AtomicU64::new(0)),
            shutdown: CancellationToken::new(),
            backoff: ReconnectConfig::default(),
            liveness: LivenessConfig::default(),
        }
    }

    /// TLS client for the configured WebSocket URL
    pub fn from_config(config: &HyperliquidConfig) -> Self {
        Self::new(config.ws_url.clone(), Arc::new(TlsConnector))
    }

    pub fn with_backoff(mut self, backoff: ReconnectConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_liveness(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = liveness;
        self
    }

    /// Register `{"type": "subscribe", "channel": channel, ...params}`
    ///
    /// Nothing is sent until the next `connect()`.
    pub fn add_subscription(&mut self, channel: &str, params: Map<String, Value>) {
        let mut sub = Map::new();
        sub.insert("type".into(), Value::from("subscribe"));
        sub.insert("channel".into(), Value::from(channel));
        sub.extend(params);
        self.subscriptions.push(Value::Object(sub));
    }

    /// Register a subscription object that is sent verbatim
    pub fn add_raw_subscription(&mut self, subscription: Value) -> ExchangeResult<()> {
        if !subscription.is_object() {
            return Err(ExchangeError::Config(format!(
                "Subscription must be a JSON object, got {}",
                subscription
            )));
        }
        self.subscriptions.push(subscription);
        Ok(())
    }

    /// Registered subscriptions in replay order
    pub fn subscriptions(&self) -> &[Value] {
        &self.subscriptions
    }

    /// Shared handle on state, liveness timestamps and attempt counter
    pub fn health(&self) -> ConnectionHealth {
        self.health.clone()
    }

    /// Token that stops [`Self::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn now_ms(&self) -> u64 {
        elapsed_ms(self.origin)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Open the socket, reset liveness and attempts, replay subscriptions
    pub async fn connect(&mut self) -> ExchangeResult<()> {
        self.health.set_state(ConnectionState::Connecting).await;
        tracing::info!(exchange = "hyperliquid", url = %self.url, "Connecting subscription socket");

        let (sink, source) = self.connector.open(&self.url).await?;
        *self.writer.lock().await = Some(sink);
        self.reader = Some(source);

        let now = self.now_ms();
        self.health.touch_all(now);
        self.health.attempts.store(0, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::SeqCst);

        {
            let mut guard = self.writer.lock().await;
            let sink = guard
                .as_mut()
                .ok_or_else(|| ExchangeError::ConnectionFailed("socket closed during replay".into()))?;
            for sub in &self.subscriptions {
                send_json(sink, sub).await?;
            }
        }

        self.health.set_state(ConnectionState::Connected).await;
        tracing::info!(
            exchange = "hyperliquid",
            count = self.subscriptions.len(),
            "Subscription socket connected"
        );
        Ok(())
    }

    /// Drop both halves of the socket; leaves shutdown untouched
    async fn disconnect(&mut self) {
        self.reader = None;
        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Socket close returned an error");
            }
        }
    }

    /// Stop for good: cancels [`Self::run`] and closes the socket
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if self.health.state().await == ConnectionState::Closed {
            return;
        }
        self.health.set_state(ConnectionState::Closing).await;
        self.disconnect().await;
        self.health.set_state(ConnectionState::Closed).await;
        tracing::info!(exchange = "hyperliquid", "Subscription client closed");
    }

    async fn send(&mut self, payload: &Value) -> ExchangeResult<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(sink) => send_json(sink, payload).await,
            None => Err(ExchangeError::ConnectionFailed("socket not open".into())),
        }
    }

    fn ack_pong(&self) {
        let now = self.now_ms();
        self.health.last_ping.store(now, Ordering::Relaxed);
        self.pong_tx.send_modify(|count| *count = count.wrapping_add(1));
        tracing::trace!("Pong received");
    }

    /// Tear down, back off and reconnect until it works
    ///
    /// Returns `false` if shutdown was requested meanwhile.
    async fn reconnect(&mut self, shutdown: &CancellationToken, cause: ExchangeError) -> bool {
        self.health.set_state(ConnectionState::Reconnecting).await;
        self.disconnect().await;
        tracing::warn!(exchange = "hyperliquid", error = %cause, "Subscription socket lost");

        loop {
            let attempt = self.health.attempts();
            let delay = self.backoff.delay_for(attempt);
            tracing::info!(
                exchange = "hyperliquid",
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }

            self.health.attempts.fetch_add(1, Ordering::Relaxed);
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                result = self.connect() => result,
            };

            match result {
                Ok(()) => {
                    tracing::info!(exchange = "hyperliquid", "Reconnected, subscriptions replayed");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(exchange = "hyperliquid", error = %e, "Reconnect attempt failed");
                    self.disconnect().await;
                    self.health.set_state(ConnectionState::Reconnecting).await;
                }
            }
        }
    }

    // =========================================================================
    // Receive loop
    // =========================================================================

    /// Route one frame; pongs and non-JSON payloads never reach the handler
    async fn dispatch<H, Fut>(&mut self, msg: Message, handler: &mut H) -> Result<Inbound, ExchangeError>
    where
        H: FnMut(Value) -> Fut,
        Fut: Future<Output = ()>,
    {
        let now = self.now_ms();
        self.health.last_receive.store(now, Ordering::Relaxed);

        match msg {
            Message::Close(frame) => Err(ExchangeError::ConnectionFailed(format!(
                "closed by server: {:?}",
                frame
            ))),
            Message::Pong(_) => {
                self.ack_pong();
                Ok(Inbound::Pong)
            }
            Message::Text(_) | Message::Binary(_) => match decode_frame(&msg) {
                Some(value) if is_pong(&value) => {
                    self.ack_pong();
                    Ok(Inbound::Pong)
                }
                Some(value) => {
                    handler(value).await;
                    Ok(Inbound::Data)
                }
                None => {
                    tracing::debug!("Skipping non-JSON frame");
                    Ok(Inbound::Ignored)
                }
            },
            _ => Ok(Inbound::Ignored),
        }
    }

    /// Ping once after a silent receive window and wait for the pong,
    /// still delivering data frames in the meantime
    async fn probe_idle<H, Fut>(&mut self, shutdown: &CancellationToken, handler: &mut H) -> Probe
    where
        H: FnMut(Value) -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::warn!(
            exchange = "hyperliquid",
            silent_s = self.liveness.receive_timeout.as_secs(),
            "No message received, probing with ping"
        );
        if let Err(e) = self.send(&ping_message()).await {
            return Probe::Lost(e);
        }

        let deadline = Instant::now() + self.liveness.ping_timeout;
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Probe::Lost(ExchangeError::ConnectionFailed("socket not open".into()));
            };
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Probe::Shutdown,
                _ = tokio::time::sleep_until(deadline) => {
                    return Probe::Lost(ExchangeError::NetworkTimeout(
                        self.liveness.ping_timeout.as_millis() as u64,
                    ));
                }
                frame = reader.next() => frame,
            };

            match frame {
                Some(Ok(msg)) => match self.dispatch(msg, handler).await {
                    Ok(Inbound::Pong) => return Probe::Alive,
                    Ok(_) => {}
                    Err(e) => return Probe::Lost(e),
                },
                Some(Err(e)) => return Probe::Lost(e.into()),
                None => {
                    return Probe::Lost(ExchangeError::ConnectionFailed("stream ended".into()))
                }
            }
        }
    }

    /// Periodic idle check; a failed ping asks the receive loop to reconnect,
    /// tagged with the generation of the socket it was sent on
    fn spawn_heartbeat(&self, token: CancellationToken, reconnect_tx: mpsc::Sender<u64>) -> JoinHandle<()> {
        let writer = Arc::clone(&self.writer);
        let generation = Arc::clone(&self.generation);
        let health = self.health.clone();
        let mut pong_rx = self.pong_tx.subscribe();
        let origin = self.origin;
        let liveness = self.liveness;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(liveness.heartbeat_interval) => {}
                }

                if health.state().await != ConnectionState::Connected {
                    continue;
                }
                let idle_ms = elapsed_ms(origin).saturating_sub(health.last_receive.load(Ordering::Relaxed));
                if idle_ms < liveness.idle_threshold.as_millis() as u64 {
                    continue;
                }

                pong_rx.borrow_and_update();
                let pinged = generation.load(Ordering::SeqCst);
                let sent = {
                    let mut guard = writer.lock().await;
                    match guard.as_mut() {
                        Some(sink) => send_json(sink, &ping_message()).await,
                        None => Err(ExchangeError::ConnectionFailed("socket not open".into())),
                    }
                };
                if let Err(e) = sent {
                    tracing::warn!(exchange = "hyperliquid", error = %e, "Heartbeat: failed to send ping");
                    let _ = reconnect_tx.try_send(pinged);
                    continue;
                }
                tracing::debug!(exchange = "hyperliquid", idle_ms, "Heartbeat: ping sent");

                let acked = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = tokio::time::timeout(liveness.ping_timeout, pong_rx.changed()) => {
                        matches!(changed, Ok(Ok(())))
                    }
                };

                if generation.load(Ordering::SeqCst) != pinged {
                    tracing::debug!(exchange = "hyperliquid", "Heartbeat: socket replaced while awaiting pong");
                    continue;
                }
                if acked {
                    let now = elapsed_ms(origin);
                    health.last_ping.store(now, Ordering::Relaxed);
                    health.last_receive.store(now, Ordering::Relaxed);
                } else {
                    tracing::warn!(
                        exchange = "hyperliquid",
                        timeout_s = liveness.ping_timeout.as_secs(),
                        "Heartbeat: pong not received"
                    );
                    let _ = reconnect_tx.try_send(pinged);
                }
            }
            tracing::debug!(exchange = "hyperliquid", "Heartbeat task stopped");
        })
    }

    /// Connect and feed every data message to `handler` until shutdown
    ///
    /// Handler calls run one at a time in wire order and are never
    /// interrupted; shutdown is checked between messages. On exit the
    /// heartbeat is stopped and awaited before the socket is closed.
    pub async fn run<H, Fut>(&mut self, mut handler: H)
    where
        H: FnMut(Value) -> Fut,
        Fut: Future<Output = ()>,
    {
        let shutdown = self.shutdown.clone();
        if shutdown.is_cancelled() {
            return;
        }

        let mut running = match self.connect().await {
            Ok(()) => true,
            Err(e) => self.reconnect(&shutdown, e).await,
        };

        let heartbeat_token = shutdown.child_token();
        let (reconnect_tx, mut reconnect_rx) = mpsc::channel::<u64>(1);
        let heartbeat = self.spawn_heartbeat(heartbeat_token.clone(), reconnect_tx);

        while running {
            let receive_timeout = self.liveness.receive_timeout;
            let wake = match self.reader.as_mut() {
                None => Wake::Lost(ExchangeError::ConnectionFailed("socket not open".into())),
                Some(reader) => tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => Wake::Shutdown,
                    Some(pinged) = reconnect_rx.recv() => {
                        if pinged == self.generation.load(Ordering::SeqCst) {
                            Wake::Lost(ExchangeError::ConnectionFailed("heartbeat ping unanswered".into()))
                        } else {
                            Wake::Stale
                        }
                    }
                    frame = tokio::time::timeout(receive_timeout, reader.next()) => match frame {
                        Ok(Some(Ok(msg))) => Wake::Frame(msg),
                        Ok(Some(Err(e))) => Wake::Lost(e.into()),
                        Ok(None) => Wake::Lost(ExchangeError::ConnectionFailed("stream ended".into())),
                        Err(_) => Wake::Idle,
                    },
                },
            };

            let lost = match wake {
                Wake::Shutdown => break,
                Wake::Lost(e) => Some(e),
                Wake::Stale => None,
                Wake::Frame(msg) => self.dispatch(msg, &mut handler).await.err(),
                Wake::Idle => match self.probe_idle(&shutdown, &mut handler).await {
                    Probe::Alive => None,
                    Probe::Lost(e) => Some(e),
                    Probe::Shutdown => break,
                },
            };

            if let Some(cause) = lost {
                running = self.reconnect(&shutdown, cause).await;
            }
        }

        heartbeat_token.cancel();
        if let Err(e) = heartbeat.await {
            tracing::warn!(error = %e, "Heartbeat task ended abnormally");
        }
        self.health.set_state(ConnectionState::Closing).await;
        self.disconnect().await;
        self.health.set_state(ConnectionState::Closed).await;
        tracing::info!(exchange = "hyperliquid", "Subscription client stopped");
    }
}
