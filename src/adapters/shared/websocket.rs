//! Shared WebSocket connection helpers
//!
//! Provides the TLS-enabled connection used in production and the
//! [`Connector`] seam the subscription client opens sockets through.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{
    connect_async_tls_with_config, Connector as TlsBackend, MaybeTlsStream, WebSocketStream,
};

use crate::adapters::errors::ExchangeError;

/// Type alias for the WebSocket stream with TLS
pub type TlsWebSocketStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Write half of an open socket
pub type WsSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Read half of an open socket
pub type WsSource = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Opens socket connections for the subscription client
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url` and return its split halves
    async fn open(&self, url: &str) -> Result<(WsSink, WsSource), ExchangeError>;
}

/// Production connector: TLS WebSocket via tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct TlsConnector;

#[async_trait]
impl Connector for TlsConnector {
    async fn open(&self, url: &str) -> Result<(WsSink, WsSource), ExchangeError> {
        let ws_stream = connect_tls(url).await?;
        let (sink, source) = ws_stream.split();
        Ok((Box::pin(sink), Box::pin(source)))
    }
}

/// Connect to a WebSocket endpoint with TLS (TLSv1.2 minimum)
///
/// # Arguments
/// * `url` - WebSocket URL to connect to (wss://)
///
/// # Returns
/// * `Ok(TlsWebSocketStream)` - Connected WebSocket stream
/// * `Err(ExchangeError)` - Connection or TLS error
pub async fn connect_tls(url: &str) -> Result<TlsWebSocketStream, ExchangeError> {
    let tls = native_tls::TlsConnector::builder()
        .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
        .build()
        .map_err(|e| ExchangeError::ConnectionFailed(format!("TLS error: {}", e)))?;

    let (ws_stream, _response) =
        connect_async_tls_with_config(url, None, false, Some(TlsBackend::NativeTls(tls)))
            .await
            .map_err(|e| ExchangeError::WebSocket(Box::new(e)))?;

    Ok(ws_stream)
}

/// Send a JSON value as a text frame
pub async fn send_json(sink: &mut WsSink, payload: &serde_json::Value) -> Result<(), ExchangeError> {
    sink.send(Message::Text(payload.to_string()))
        .await
        .map_err(|e| ExchangeError::WebSocket(Box::new(e)))
}

/// Decode a frame into JSON
///
/// Returns `None` for control frames and payloads that are not JSON.
pub fn decode_frame(msg: &Message) -> Option<serde_json::Value> {
    match msg {
        Message::Text(text) => serde_json::from_str(text).ok(),
        Message::Binary(data) => serde_json::from_slice(data).ok(),
        _ => None,
    }
}
