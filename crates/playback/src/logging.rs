//! Tracing setup for hosts and tests.
//!
//! The controller only emits `tracing` events; nothing here runs unless the host asks for it.

use tracing_subscriber::EnvFilter;

use crate::error::{PlaybackError, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "playback=info";

/// Build the filter from `RUST_LOG`, falling back to `default_filter`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a global `fmt` subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(true)
        .try_init()
        .map_err(|e| {
            PlaybackError::configuration(format!("failed to install tracing subscriber: {e}"))
        })
}
