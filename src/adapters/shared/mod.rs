//! Shared helpers for exchange adapters
//!
//! This module provides common utilities for WebSocket connection management
//! and reconnection backoff.

pub mod reconnect;
pub mod websocket;

pub use reconnect::ReconnectConfig;
pub use websocket::{connect_tls, Connector, TlsConnector, WsSink, WsSource};
