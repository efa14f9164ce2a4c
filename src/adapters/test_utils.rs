//! Shared test utilities for adapter testing
//!
//! [`MockConnector`] stands in for the TLS connector: every `open()` creates
//! an in-memory socket and hands the server end ([`MockSession`]) to the test,
//! which can then read what the client sent and push frames back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::adapters::errors::ExchangeError;
use crate::adapters::shared::{Connector, WsSink, WsSource};

/// Server end of one in-memory connection
pub struct MockSession {
    /// URL the client opened
    pub url: String,
    /// Frames written by the client
    pub sent: mpsc::UnboundedReceiver<Message>,
    /// Frames (or errors) delivered to the client's reader
    pub push: mpsc::UnboundedSender<Result<Message, WsError>>,
}

impl MockSession {
    /// Next JSON frame written by the client, skipping control frames
    ///
    /// `None` once the client has dropped its write half.
    pub async fn next_json(&mut self) -> Option<Value> {
        while let Some(msg) = self.sent.recv().await {
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str(&text) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// JSON frames already written by the client, without waiting
    pub fn drain_json(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(msg) = self.sent.try_recv() {
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str(&text) {
                    frames.push(value);
                }
            }
        }
        frames
    }

    /// Deliver a JSON text frame to the client
    pub fn send_json(&self, value: Value) {
        let _ = self.push.send(Ok(Message::Text(value.to_string())));
    }

    /// Deliver a raw text frame to the client
    pub fn send_text(&self, text: &str) {
        let _ = self.push.send(Ok(Message::Text(text.to_string())));
    }

    /// Answer a ping
    pub fn pong(&self) {
        self.send_json(serde_json::json!({"channel": "pong"}));
    }

    /// Send a Close frame
    pub fn close(&self) {
        let _ = self.push.send(Ok(Message::Close(None)));
    }
}

/// Connector producing in-memory sockets
pub struct MockConnector {
    sessions: mpsc::UnboundedSender<MockSession>,
    failures: Mutex<VecDeque<String>>,
    opens: AtomicUsize,
}

impl MockConnector {
    /// Connector plus the receiver on which each opened session arrives
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockSession>) {
        let (sessions, rx) = mpsc::unbounded_channel();
        (
            Self {
                sessions,
                failures: Mutex::new(VecDeque::new()),
                opens: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Make the next `count` opens fail
    pub fn fail_next(&self, count: usize) {
        let mut failures = self.failures.lock().unwrap_or_else(|p| p.into_inner());
        for _ in 0..count {
            failures.push_back("connection refused".to_string());
        }
    }

    /// Number of `open()` calls so far, failed ones included
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<(WsSink, WsSource), ExchangeError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        if let Some(reason) = failure {
            return Err(ExchangeError::ConnectionFailed(reason));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<Message, WsError>>();

        let sink = futures_util::sink::unfold(out_tx, |tx, msg: Message| async move {
            tx.send(msg).map_err(|_| WsError::ConnectionClosed)?;
            Ok::<_, WsError>(tx)
        });
        let source = futures_util::stream::unfold(in_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        self.sessions
            .send(MockSession {
                url: url.to_string(),
                sent: out_rx,
                push: in_tx,
            })
            .map_err(|_| ExchangeError::ConnectionFailed("mock server dropped".into()))?;

        Ok((Box::pin(sink), Box::pin(source)))
    }
}
