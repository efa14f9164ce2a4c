//! Exchange adapter error types
//!
//! All exchange-related errors are wrapped in ExchangeError enum
//! which implements thiserror for consistent error handling.
//!
//! Each variant belongs to one [`ErrorKind`], so callers can tell
//! "my request was malformed before it left the process" apart from
//! "the exchange rejected it".

use thiserror::Error;

/// Coarse error category used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal, never retried (missing key, malformed action or subscription)
    Configuration,
    /// Nonce or signature could not be produced locally
    Signing,
    /// The exchange answered with an error or could not be reached
    Transport,
    /// Socket liveness failure, handled by reconnecting
    Liveness,
}

/// Exchange-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No private key and no delegating callback configured
    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    /// Signature computation failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Nonce rejected locally (outside validity window or already used)
    #[error("Nonce rejected: {0}")]
    Nonce(String),

    /// Non-2xx HTTP response
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Exchange accepted the request but answered `{"status": "err"}`
    #[error("Rejected by exchange: {0}")]
    Rejected(String),

    /// Request never produced a response (DNS, TLS, timeout)
    #[error("Request failed: {0}")]
    Request(String),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection to exchange failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl ExchangeError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::SigningUnavailable(_) => ErrorKind::Configuration,
            Self::Signing(_) | Self::Nonce(_) => ErrorKind::Signing,
            Self::Http { .. }
            | Self::Rejected(_)
            | Self::Request(_)
            | Self::InvalidResponse(_) => ErrorKind::Transport,
            Self::ConnectionFailed(_) | Self::NetworkTimeout(_) | Self::WebSocket(_) => {
                ErrorKind::Liveness
            }
        }
    }

    /// True when the error was raised before anything left the process
    pub fn is_local(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Signing)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(Box::new(e))
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
