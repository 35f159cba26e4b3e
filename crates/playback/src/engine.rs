//! Delivery engine abstraction.
//!
//! The controller drives an external segmented-media delivery engine (an HLS playback
//! library) through [`DeliveryEngine`]. Engines are created per session by an
//! [`EngineFactory`] and report asynchronous happenings through [`EngineEvent`]s.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::media::MediaElement;
use crate::recovery::ErrorEvent;
use crate::subscription::Subscription;

/// One rendition advertised by the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityLevel {
    pub index: usize,
    pub bitrate_bps: u64,
}

impl QualityLevel {
    pub fn new(index: usize, bitrate_bps: u64) -> Self {
        Self { index, bitrate_bps }
    }
}

/// Level selection mode requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSelection {
    /// Engine-driven adaptive selection.
    Auto,
    /// Pin playback to one level index.
    Fixed(usize),
}

impl fmt::Display for LevelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fixed(index) => write!(f, "{index}"),
        }
    }
}

/// The engine's mutable buffer-size configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferTargets {
    pub max_buffer_length_secs: f64,
    pub max_max_buffer_length_secs: f64,
    pub max_buffer_size_bytes: u64,
}

impl From<&EngineConfig> for BufferTargets {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_buffer_length_secs: config.max_buffer_length_secs,
            max_max_buffer_length_secs: config.max_max_buffer_length_secs,
            max_buffer_size_bytes: config.max_buffer_size_bytes,
        }
    }
}

impl BufferTargets {
    /// Scale the forward buffer targets by `factor`, keeping the length under its ceiling.
    pub fn widened(self, factor: f64) -> Self {
        let length = (self.max_buffer_length_secs * factor).min(self.max_max_buffer_length_secs);
        let size = (self.max_buffer_size_bytes as f64 * factor).round() as u64;
        Self {
            max_buffer_length_secs: length,
            max_max_buffer_length_secs: self.max_max_buffer_length_secs,
            max_buffer_size_bytes: size,
        }
    }
}

/// Events emitted by a delivery engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ManifestParsed { levels: Vec<QualityLevel> },
    BufferAppended,
    Error(ErrorEvent),
}

/// Callback registered with an engine.
pub type EngineListener = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// A segmented-media delivery engine instance.
///
/// Methods are non-blocking: network activity happens inside the engine and is reported
/// back through the subscribed listener. An engine may invoke its listeners from inside
/// any of these calls.
pub trait DeliveryEngine: Send {
    fn load_source(&mut self, url: &str);
    fn attach_media(&mut self, media: Arc<dyn MediaElement>);
    /// Restart segment loading after a fatal network error.
    fn start_load(&mut self);
    /// Reset the media pipeline after a fatal media error.
    fn recover_media_error(&mut self);
    /// Detach from the media element and release all resources.
    fn destroy(&mut self);

    fn subscribe(&mut self, listener: EngineListener) -> Subscription;

    /// Current distance from the live edge, in seconds.
    fn latency(&self) -> Option<f64>;
    /// Latency the engine is aiming for, in seconds.
    fn target_latency(&self) -> Option<f64>;
    /// Media time of the live synchronization point.
    fn live_sync_position(&self) -> Option<f64>;

    /// Quality ladder of the loaded manifest.
    fn levels(&self) -> Vec<QualityLevel>;
    /// Index of the level currently playing, if known.
    fn current_level(&self) -> Option<usize>;
    fn set_current_level(&mut self, selection: LevelSelection);

    /// Whether the engine honours [`DeliveryEngine::set_auto_level_capping`].
    fn supports_level_capping(&self) -> bool {
        true
    }
    fn auto_level_capping(&self) -> Option<usize>;
    /// Highest level automatic selection may pick; `None` removes the cap.
    fn set_auto_level_capping(&mut self, cap: Option<usize>);

    fn buffer_targets(&self) -> BufferTargets;
    fn set_buffer_targets(&mut self, targets: BufferTargets);
}

/// Creates delivery engine instances.
pub trait EngineFactory: Send + Sync {
    /// Whether the engine can run on this device at all.
    fn is_supported(&self) -> bool;

    fn create(&self, config: &EngineConfig) -> Result<Box<dyn DeliveryEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widened_caps_length_at_ceiling() {
        let targets = BufferTargets {
            max_buffer_length_secs: 500.0,
            max_max_buffer_length_secs: 600.0,
            max_buffer_size_bytes: 60_000_000,
        };

        let widened = targets.widened(1.5);
        assert_eq!(widened.max_buffer_length_secs, 600.0);
        assert_eq!(widened.max_buffer_size_bytes, 90_000_000);
        assert_eq!(widened.max_max_buffer_length_secs, 600.0);
    }

    #[test]
    fn test_buffer_targets_from_engine_config() {
        let targets = BufferTargets::from(&EngineConfig::default());
        assert_eq!(targets.max_buffer_length_secs, 30.0);
        assert_eq!(targets.max_max_buffer_length_secs, 600.0);
    }
}
