//! Application-wide constants and configuration defaults
//!
//! Values that operators may need to tune without a rebuild are read from
//! environment variables, falling back to the defaults below.

use std::time::Duration;

/// Default timeout for REST calls, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Environment variable pointing at an optional YAML stream configuration
pub const CONFIG_PATH_ENV: &str = "HL_CONFIG";

/// Coins streamed when neither the YAML file nor `HL_COINS` names any
pub const DEFAULT_COINS: &[&str] = &["BTC"];

// =============================================================================
// HTTP Configuration
// =============================================================================

/// Timeout applied to every `/info` and `/exchange` request (default: 30 seconds)
///
/// Environment variable: `HL_HTTP_TIMEOUT_SECS`
pub fn http_timeout() -> Duration {
    let secs = std::env::var("HL_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s: &u64| *s > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn test_http_timeout_default() {
        std::env::remove_var("HL_HTTP_TIMEOUT_SECS");
        assert_eq!(http_timeout(), Duration::from_secs(30));
    }

    #[test]
    #[serial(env)]
    fn test_http_timeout_env_override() {
        std::env::set_var("HL_HTTP_TIMEOUT_SECS", "5");
        assert_eq!(http_timeout(), Duration::from_secs(5));

        // Zero and garbage fall back to the default
        std::env::set_var("HL_HTTP_TIMEOUT_SECS", "0");
        assert_eq!(http_timeout(), Duration::from_secs(30));
        std::env::set_var("HL_HTTP_TIMEOUT_SECS", "soon");
        assert_eq!(http_timeout(), Duration::from_secs(30));

        std::env::remove_var("HL_HTTP_TIMEOUT_SECS");
    }
}
