//! Periodic playback monitors.
//!
//! Each monitor is a small policy object with no knowledge of timers; the session runs
//! them on their own intervals and applies the decisions to the engine and media element.

pub mod buffer_health;
pub mod live_edge;
pub mod rate;

pub use buffer_health::{
    BufferHealthMonitor, BufferSample, DefensiveAdjustment, NetworkQualityState, NetworkTier,
    TierTransition,
};
pub use live_edge::LiveEdgeSynchronizer;
pub use rate::{RateCondition, RateController, RateRule};

use crate::engine::DeliveryEngine;

/// Live latency as reported by the engine for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyMeasurement {
    pub live_latency_secs: f64,
    pub target_latency_secs: f64,
}

impl LatencyMeasurement {
    pub fn new(live_latency_secs: f64, target_latency_secs: f64) -> Self {
        Self {
            live_latency_secs,
            target_latency_secs,
        }
    }

    /// Read the engine's latency pair; `None` unless both values are finite.
    pub fn read(engine: &dyn DeliveryEngine) -> Option<Self> {
        let latency = engine.latency()?;
        let target = engine.target_latency()?;
        (latency.is_finite() && target.is_finite()).then(|| Self::new(latency, target))
    }

    /// Seconds behind the target latency; negative when ahead of it.
    pub fn excess_secs(&self) -> f64 {
        self.live_latency_secs - self.target_latency_secs
    }
}
