//! Configuration module
//!
//! This module provides:
//! - Stream configuration types (`StreamConfig`, `ReconnectSettings`)
//! - YAML loading functionality (`load_config`)
//! - Logging initialisation (`logging::init_logging`)
//! - Application constants with environment variable overrides

pub mod constants;
pub mod logging;
mod loader;
mod types;

// Re-export types
pub use types::{ReconnectSettings, StreamConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
