//! Startup quality selection.
//!
//! The first seconds of a live session are the most fragile, so playback starts on the
//! level closest to a conservative bitrate rather than the best one. After a warm-up the
//! engine's automatic selection takes over.

use tracing::{debug, info};

use crate::config::QualityConfig;
use crate::engine::{DeliveryEngine, LevelSelection, QualityLevel};

/// Level whose bitrate is closest to `target_bps`; ties prefer the lower bitrate.
///
/// Returns `None` when there is nothing to choose between.
pub fn select_startup_level(levels: &[QualityLevel], target_bps: u64) -> Option<usize> {
    if levels.len() < 2 {
        return None;
    }
    levels
        .iter()
        .min_by_key(|level| (level.bitrate_bps.abs_diff(target_bps), level.bitrate_bps))
        .map(|level| level.index)
}

#[derive(Debug, Clone)]
pub struct QualityPolicy {
    config: QualityConfig,
    pinned: Option<usize>,
}

impl QualityPolicy {
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            pinned: None,
        }
    }

    pub fn pinned(&self) -> Option<usize> {
        self.pinned
    }

    /// Pin the startup level once the manifest is known. Returns the pinned index.
    pub fn on_manifest_parsed(
        &mut self,
        engine: &mut dyn DeliveryEngine,
        levels: &[QualityLevel],
    ) -> Option<usize> {
        let index = select_startup_level(levels, self.config.startup_bitrate_bps)?;
        engine.set_current_level(LevelSelection::Fixed(index));
        self.pinned = Some(index);
        info!(
            level = index,
            levels = levels.len(),
            startup_bitrate_bps = self.config.startup_bitrate_bps,
            "Pinned startup quality level"
        );
        Some(index)
    }

    /// Release the startup pin to automatic selection.
    ///
    /// A level cap applied by the buffer health monitor is left alone, so automatic
    /// selection keeps operating beneath it.
    pub fn release(&mut self, engine: &mut dyn DeliveryEngine) -> bool {
        let Some(index) = self.pinned.take() else {
            return false;
        };
        engine.set_current_level(LevelSelection::Auto);
        debug!(
            released = index,
            cap = ?engine.auto_level_capping(),
            "Handed quality selection back to automatic"
        );
        true
    }
}
