//! Media element abstraction.
//!
//! The media element is owned by the UI layer and lent to one playback session at a time.
//! All methods take `&self`; implementations use interior mutability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::subscription::Subscription;

/// A contiguous buffered span of media time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Seconds of media buffered ahead of `current_time`.
///
/// Uses the range containing the playhead, falling back to the last range. Never negative.
pub fn buffered_ahead(ranges: &[TimeRange], current_time: f64) -> f64 {
    let end = ranges
        .iter()
        .find(|range| range.contains(current_time))
        .or_else(|| ranges.last())
        .map(|range| range.end);

    match end {
        Some(end) if end.is_finite() && current_time.is_finite() => (end - current_time).max(0.0),
        _ => 0.0,
    }
}

/// HTML-style ready state of a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Events emitted by a media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    Waiting,
    Playing,
    Pause,
    Ended,
    Error { code: Option<u16> },
}

pub type MediaListener = Arc<dyn Fn(MediaEvent) + Send + Sync>;

#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Begin playback. Resolves once playback has started or was refused.
    async fn play(&self) -> Result<()>;
    fn pause(&self);

    fn current_time(&self) -> f64;
    fn set_current_time(&self, time: f64);

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);

    fn buffered(&self) -> Vec<TimeRange>;
    fn is_paused(&self) -> bool;
    fn is_seeking(&self) -> bool;
    fn ready_state(&self) -> ReadyState;

    /// Set or clear (`None`) the element's source attribute.
    fn set_source(&self, url: Option<&str>);
    /// Reload the element from its current source.
    fn load(&self);
    fn can_play_native_hls(&self) -> bool;

    fn subscribe(&self, listener: MediaListener) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_ahead_uses_range_containing_playhead() {
        let ranges = [TimeRange::new(0.0, 10.0), TimeRange::new(12.0, 40.0)];
        assert_eq!(buffered_ahead(&ranges, 15.0), 25.0);
        assert_eq!(buffered_ahead(&ranges, 4.0), 6.0);
    }

    #[test]
    fn test_buffered_ahead_falls_back_to_last_range() {
        let ranges = [TimeRange::new(0.0, 10.0), TimeRange::new(12.0, 20.0)];
        assert_eq!(buffered_ahead(&ranges, 11.0), 9.0);
    }

    #[test]
    fn test_buffered_ahead_never_negative() {
        let ranges = [TimeRange::new(0.0, 10.0)];
        assert_eq!(buffered_ahead(&ranges, 30.0), 0.0);
        assert_eq!(buffered_ahead(&[], 5.0), 0.0);
        assert_eq!(buffered_ahead(&ranges, f64::NAN), 0.0);
    }
}
