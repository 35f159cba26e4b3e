//! Controller configuration.
//!
//! Every section has defaults matching the tuning the TV client ships with. All structs
//! deserialize with `#[serde(default)]`, so a host can override a single threshold in JSON
//! without restating the rest.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};
use crate::monitor::rate::{RateCondition, RateRule};

// --- Delivery Engine Configuration ---

/// Parameters handed to the delivery engine when a session creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Forward buffer the engine tries to keep, in seconds.
    pub max_buffer_length_secs: f64,
    /// Hard ceiling for the forward buffer, in seconds.
    pub max_max_buffer_length_secs: f64,
    /// Forward buffer size limit in bytes.
    pub max_buffer_size_bytes: u64,
    /// Largest buffer hole the engine jumps over, in seconds.
    pub max_buffer_hole_secs: f64,
    pub low_latency_mode: bool,
    /// Back buffer kept behind the playhead, in seconds.
    pub back_buffer_length_secs: f64,
    /// Start position in seconds; `None` starts at the live edge.
    pub start_position_secs: Option<f64>,
    pub enable_worker: bool,
    pub enable_software_aes: bool,
    pub fragment_loading_timeout_ms: u64,
    pub manifest_loading_timeout_ms: u64,
    pub level_loading_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buffer_length_secs: 30.0,
            max_max_buffer_length_secs: 600.0,
            max_buffer_size_bytes: 60 * 1000 * 1000,
            max_buffer_hole_secs: 0.5,
            low_latency_mode: true,
            back_buffer_length_secs: 90.0,
            start_position_secs: None,
            enable_worker: true,
            enable_software_aes: true,
            fragment_loading_timeout_ms: 20_000,
            manifest_loading_timeout_ms: 10_000,
            level_loading_timeout_ms: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn fragment_loading_timeout(&self) -> Duration {
        Duration::from_millis(self.fragment_loading_timeout_ms)
    }

    pub fn manifest_loading_timeout(&self) -> Duration {
        Duration::from_millis(self.manifest_loading_timeout_ms)
    }

    pub fn level_loading_timeout(&self) -> Duration {
        Duration::from_millis(self.level_loading_timeout_ms)
    }
}

// --- Buffer Health Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferHealthConfig {
    pub sample_interval_ms: u64,
    /// A sample below this many buffered seconds counts as a stall.
    pub stall_threshold_secs: f64,
    /// Minimum spacing between two sampled stalls.
    pub stall_dedup_window_ms: u64,
    /// Stall count at which the tier becomes `Poor`.
    pub poor_stall_count: u32,
    /// Above this many buffered seconds the stall count decays by one per sample.
    pub healthy_buffer_secs: f64,
    /// Above this many buffered seconds the tier returns to `Good`.
    pub recovered_buffer_secs: f64,
    /// Multiplier applied to the engine's buffer targets on entering `Poor`.
    pub buffer_widen_factor: f64,
}

impl Default for BufferHealthConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 3_000,
            stall_threshold_secs: 2.0,
            stall_dedup_window_ms: 30_000,
            poor_stall_count: 3,
            healthy_buffer_secs: 10.0,
            recovered_buffer_secs: 15.0,
            buffer_widen_factor: 1.5,
        }
    }
}

impl BufferHealthConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn stall_dedup_window(&self) -> Duration {
        Duration::from_millis(self.stall_dedup_window_ms)
    }
}

// --- Live Edge Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveEdgeConfig {
    pub check_interval_ms: u64,
    /// Drift beyond the target latency that triggers a hard seek.
    pub max_drift_secs: f64,
}

impl Default for LiveEdgeConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 12_000,
            max_drift_secs: 15.0,
        }
    }
}

impl LiveEdgeConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

// --- Playback Rate Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateControlConfig {
    pub adjust_interval_ms: u64,
    pub min_rate: f64,
    pub max_rate: f64,
    /// Rate changes smaller than this are not applied.
    pub epsilon: f64,
    /// Ordered rule table; the first matching rule wins, no match means 1.0.
    pub rules: Vec<RateRule>,
}

impl Default for RateControlConfig {
    fn default() -> Self {
        Self {
            adjust_interval_ms: 10_000,
            min_rate: 0.95,
            max_rate: 1.10,
            epsilon: 0.005,
            rules: vec![
                RateRule::new(RateCondition::BufferBelow { secs: 8.0 }, 0.97),
                RateRule::new(RateCondition::BufferBelow { secs: 10.0 }, 0.99),
                RateRule::new(
                    RateCondition::CatchUp {
                        buffer_above_secs: 50.0,
                        latency_excess_secs: 10.0,
                    },
                    1.10,
                ),
                RateRule::new(
                    RateCondition::CatchUp {
                        buffer_above_secs: 40.0,
                        latency_excess_secs: 5.0,
                    },
                    1.05,
                ),
                RateRule::new(
                    RateCondition::CatchUp {
                        buffer_above_secs: 30.0,
                        latency_excess_secs: 0.0,
                    },
                    1.02,
                ),
            ],
        }
    }
}

impl RateControlConfig {
    pub fn adjust_interval(&self) -> Duration {
        Duration::from_millis(self.adjust_interval_ms)
    }
}

// --- Quality Selection Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Bitrate the startup level should be closest to.
    pub startup_bitrate_bps: u64,
    /// Delay after manifest parse before automatic selection takes over.
    pub warmup_ms: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            startup_bitrate_bps: 1_500_000,
            warmup_ms: 10_000,
        }
    }
}

impl QualityConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

// --- Recovery Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub network_backoff_ms: u64,
    pub media_backoff_ms: u64,
    /// How long a non-fatal network hiccup keeps the reconnecting indicator up.
    pub transient_notice_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            network_backoff_ms: 1_000,
            media_backoff_ms: 1_000,
            transient_notice_ms: 2_000,
        }
    }
}

impl RecoveryConfig {
    pub fn network_backoff(&self) -> Duration {
        Duration::from_millis(self.network_backoff_ms)
    }

    pub fn media_backoff(&self) -> Duration {
        Duration::from_millis(self.media_backoff_ms)
    }

    pub fn transient_notice(&self) -> Duration {
        Duration::from_millis(self.transient_notice_ms)
    }
}

// --- Status Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Lifetime of a non-terminal error banner.
    pub advisory_banner_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            advisory_banner_ms: 5_000,
        }
    }
}

impl StatusConfig {
    pub fn advisory_banner(&self) -> Duration {
        Duration::from_millis(self.advisory_banner_ms)
    }
}

// --- Top-Level Configuration ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub engine: EngineConfig,
    pub buffer_health: BufferHealthConfig,
    pub live_edge: LiveEdgeConfig,
    pub rate: RateControlConfig,
    pub quality: QualityConfig,
    pub recovery: RecoveryConfig,
    pub status: StatusConfig,
}

impl PlayerConfig {
    /// Parse a (possibly partial) JSON document and validate the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("buffer_health.sample_interval_ms", self.buffer_health.sample_interval_ms),
            ("live_edge.check_interval_ms", self.live_edge.check_interval_ms),
            ("rate.adjust_interval_ms", self.rate.adjust_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(PlaybackError::configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let rate = &self.rate;
        if !(rate.min_rate.is_finite() && rate.max_rate.is_finite())
            || rate.min_rate <= 0.0
            || rate.min_rate > 1.0
            || rate.max_rate < 1.0
        {
            return Err(PlaybackError::configuration(format!(
                "rate bounds must satisfy 0 < min <= 1.0 <= max, got [{}, {}]",
                rate.min_rate, rate.max_rate
            )));
        }
        if let Some(rule) = rate
            .rules
            .iter()
            .find(|rule| !(rate.min_rate..=rate.max_rate).contains(&rule.rate))
        {
            return Err(PlaybackError::configuration(format!(
                "rate rule {:?} is outside [{}, {}]",
                rule, rate.min_rate, rate.max_rate
            )));
        }

        let health = &self.buffer_health;
        if health.poor_stall_count == 0 {
            return Err(PlaybackError::configuration(
                "buffer_health.poor_stall_count must be at least 1",
            ));
        }
        if health.recovered_buffer_secs < health.healthy_buffer_secs {
            return Err(PlaybackError::configuration(
                "buffer_health.recovered_buffer_secs must not be below healthy_buffer_secs",
            ));
        }
        if health.buffer_widen_factor < 1.0 {
            return Err(PlaybackError::configuration(
                "buffer_health.buffer_widen_factor must be at least 1.0",
            ));
        }

        if self.engine.max_buffer_length_secs > self.engine.max_max_buffer_length_secs {
            return Err(PlaybackError::configuration(
                "engine.max_buffer_length_secs exceeds max_max_buffer_length_secs",
            ));
        }

        Ok(())
    }
}
