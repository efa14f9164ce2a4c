//! Shared reconnection backoff
//!
//! Capped exponential backoff used by the subscription client between
//! reconnect attempts. Attempts are unbounded; only the delay is capped.

use std::time::Duration;

/// Configuration for reconnection delays
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay in milliseconds (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt number `attempt` (starting at 0)
    ///
    /// `min(max_delay, initial_delay * 2^attempt)`: with the defaults this
    /// yields 500ms, 1s, 2s, 4s, then 5s forever.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}
