//! Live-edge drift correction.
//!
//! Large drift behind the live edge is corrected with a single hard seek. Small drift is
//! left to the rate controller so viewers do not see jumps.

use tracing::info;

use super::LatencyMeasurement;
use crate::config::LiveEdgeConfig;

#[derive(Debug, Clone)]
pub struct LiveEdgeSynchronizer {
    max_drift_secs: f64,
}

impl LiveEdgeSynchronizer {
    pub fn new(config: &LiveEdgeConfig) -> Self {
        Self {
            max_drift_secs: config.max_drift_secs,
        }
    }

    /// Position to seek to, if the drift warrants a seek this tick.
    pub fn seek_target(
        &self,
        latency: Option<LatencyMeasurement>,
        live_sync_position: Option<f64>,
    ) -> Option<f64> {
        let latency = latency?;
        if latency.excess_secs() <= self.max_drift_secs {
            return None;
        }
        let position = live_sync_position.filter(|p| p.is_finite())?;
        info!(
            latency_secs = latency.live_latency_secs,
            target_latency_secs = latency.target_latency_secs,
            live_sync_position = position,
            "Drifted behind live edge, seeking"
        );
        Some(position)
    }
}
