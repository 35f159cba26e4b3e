//! Buffer health sampling and network quality classification.
//!
//! Stalls move the tier up (`Good` → `Medium` → `Poor`); only a comfortably full buffer
//! moves it back to `Good`. Sampled stalls closer together than the dedup window count
//! once, so a single noisy sample cannot escalate the tier.

use std::fmt;

use tokio::time::Instant;
use tracing::debug;

use crate::config::BufferHealthConfig;
use crate::engine::{BufferTargets, DeliveryEngine};
use crate::media::{MediaElement, buffered_ahead};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkTier {
    Good,
    Medium,
    Poor,
}

impl NetworkTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Medium => "medium",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for NetworkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One buffered-depth observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferSample {
    pub timestamp: Instant,
    pub buffered_secs: f64,
    pub current_time: f64,
}

impl BufferSample {
    pub fn capture(media: &dyn MediaElement, timestamp: Instant) -> Self {
        let current_time = media.current_time();
        Self {
            timestamp,
            buffered_secs: buffered_ahead(&media.buffered(), current_time),
            current_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkQualityState {
    pub tier: NetworkTier,
    pub stall_count: u32,
    pub last_stall_at: Option<Instant>,
}

impl Default for NetworkQualityState {
    fn default() -> Self {
        Self {
            tier: NetworkTier::Good,
            stall_count: 0,
            last_stall_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTransition {
    pub from: NetworkTier,
    pub to: NetworkTier,
}

impl TierTransition {
    pub fn entered_poor(&self) -> bool {
        self.to == NetworkTier::Poor && self.from != NetworkTier::Poor
    }
}

pub struct BufferHealthMonitor {
    config: BufferHealthConfig,
    state: NetworkQualityState,
}

impl BufferHealthMonitor {
    pub fn new(config: BufferHealthConfig) -> Self {
        Self {
            config,
            state: NetworkQualityState::default(),
        }
    }

    pub fn state(&self) -> NetworkQualityState {
        self.state
    }

    /// Fold one sample into the quality state.
    pub fn observe(&mut self, sample: BufferSample) -> Option<TierTransition> {
        let before = self.state.tier;
        let buffered = sample.buffered_secs.max(0.0);

        if buffered < self.config.stall_threshold_secs {
            let window = self.config.stall_dedup_window();
            let qualifies = self
                .state
                .last_stall_at
                .is_none_or(|last| sample.timestamp.saturating_duration_since(last) >= window);
            if qualifies {
                self.register_stall(sample.timestamp);
            } else {
                debug!(buffered_secs = buffered, "Low buffer inside stall dedup window");
            }
        }

        if buffered > self.config.healthy_buffer_secs {
            self.state.stall_count = self.state.stall_count.saturating_sub(1);
        }
        if buffered > self.config.recovered_buffer_secs && self.state.tier != NetworkTier::Good {
            self.state.tier = NetworkTier::Good;
        }

        self.transition_from(before)
    }

    /// Count a stall the engine reported itself. No dedup window applies.
    pub fn record_stall(&mut self, now: Instant) -> Option<TierTransition> {
        let before = self.state.tier;
        self.register_stall(now);
        self.transition_from(before)
    }

    fn register_stall(&mut self, now: Instant) {
        self.state.stall_count += 1;
        self.state.last_stall_at = Some(now);

        let escalated = if self.state.stall_count >= self.config.poor_stall_count {
            NetworkTier::Poor
        } else {
            NetworkTier::Medium
        };
        self.state.tier = self.state.tier.max(escalated);
        debug!(
            stall_count = self.state.stall_count,
            tier = %self.state.tier,
            "Recorded playback stall"
        );
    }

    fn transition_from(&self, before: NetworkTier) -> Option<TierTransition> {
        (before != self.state.tier).then(|| TierTransition {
            from: before,
            to: self.state.tier,
        })
    }
}

/// What the monitor changed on the engine when the tier dropped to `Poor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefensiveAdjustment {
    pub buffer_targets: BufferTargets,
    /// New automatic level cap, if one was applied.
    pub level_cap: Option<usize>,
}

/// Widen the engine's buffer targets and step the level cap down by one.
pub fn apply_defensive_adjustment(
    engine: &mut dyn DeliveryEngine,
    widen_factor: f64,
) -> DefensiveAdjustment {
    let buffer_targets = engine.buffer_targets().widened(widen_factor);
    engine.set_buffer_targets(buffer_targets);

    let level_cap = match engine.current_level() {
        Some(current) if current > 0 && engine.supports_level_capping() => {
            let cap = match engine.auto_level_capping() {
                Some(existing) => existing.min(current - 1),
                None => current - 1,
            };
            engine.set_auto_level_capping(Some(cap));
            Some(cap)
        }
        _ => None,
    };

    DefensiveAdjustment {
        buffer_targets,
        level_cap,
    }
}
