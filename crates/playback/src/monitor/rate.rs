//! Playback-rate correction.
//!
//! Small deviations in buffer depth or live latency are absorbed by nudging the play rate
//! instead of seeking. Rules are evaluated in order and the first match wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LatencyMeasurement;
use crate::config::RateControlConfig;

/// Condition half of a rate rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateCondition {
    /// Buffered seconds strictly below `secs`.
    BufferBelow { secs: f64 },
    /// Buffered seconds strictly above `buffer_above_secs` and latency strictly more than
    /// `latency_excess_secs` behind the target. Never matches without a latency reading.
    CatchUp {
        buffer_above_secs: f64,
        latency_excess_secs: f64,
    },
}

impl RateCondition {
    pub fn matches(&self, buffered_secs: f64, latency: Option<LatencyMeasurement>) -> bool {
        match *self {
            Self::BufferBelow { secs } => buffered_secs < secs,
            Self::CatchUp {
                buffer_above_secs,
                latency_excess_secs,
            } => {
                buffered_secs > buffer_above_secs
                    && latency.is_some_and(|l| l.excess_secs() > latency_excess_secs)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRule {
    pub condition: RateCondition,
    pub rate: f64,
}

impl RateRule {
    pub fn new(condition: RateCondition, rate: f64) -> Self {
        Self { condition, rate }
    }
}

/// Tracks the applied rate and decides when it should change.
#[derive(Debug, Clone)]
pub struct RateController {
    config: RateControlConfig,
    current: f64,
}

impl RateController {
    pub const NORMAL_RATE: f64 = 1.0;

    pub fn new(config: RateControlConfig) -> Self {
        Self {
            config,
            current: Self::NORMAL_RATE,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Rate the rule table asks for, clamped to the configured bounds.
    pub fn target_rate(&self, buffered_secs: f64, latency: Option<LatencyMeasurement>) -> f64 {
        let rate = self
            .config
            .rules
            .iter()
            .find(|rule| rule.condition.matches(buffered_secs, latency))
            .map_or(Self::NORMAL_RATE, |rule| rule.rate);
        self.clamp(rate)
    }

    /// Evaluate one tick. Returns the new rate when it should be applied.
    pub fn evaluate(
        &mut self,
        buffered_secs: f64,
        latency: Option<LatencyMeasurement>,
    ) -> Option<f64> {
        let target = self.target_rate(buffered_secs, latency);
        if (target - self.current).abs() <= self.config.epsilon {
            return None;
        }
        debug!(
            from = self.current,
            to = target,
            buffered_secs,
            latency_excess_secs = latency.map(|l| l.excess_secs()),
            "Adjusting playback rate"
        );
        self.current = target;
        Some(target)
    }

    /// Force the normal rate; used on teardown.
    pub fn reset(&mut self) -> f64 {
        self.current = Self::NORMAL_RATE;
        self.current
    }

    fn clamp(&self, rate: f64) -> f64 {
        if rate.is_finite() {
            rate.clamp(self.config.min_rate, self.config.max_rate)
        } else {
            Self::NORMAL_RATE
        }
    }
}
