//! Playback session state.
//!
//! A [`PlaybackSession`] exclusively owns the engine instance, the tasks running its
//! monitors and the listener subscriptions wired to the engine and media element. Tearing
//! it down releases all of them at once.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PlayerConfig;
use crate::engine::DeliveryEngine;
use crate::media::MediaElement;
use crate::monitor::{
    BufferHealthMonitor, DefensiveAdjustment, LiveEdgeSynchronizer, RateController,
};
use crate::quality::QualityPolicy;
use crate::recovery::RetryKind;
use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Buffering,
    Recovering,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Buffering => "buffering",
            Self::Recovering => "recovering",
            Self::Stopped => "stopped",
        }
    }

    /// Whether the session still owns live resources.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle | Self::Stopped)
    }

    /// Whether media is flowing, so buffer and latency readings are meaningful.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Playing | Self::Buffering)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tasks spawned on behalf of one session.
pub(crate) struct TimerSet {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TimerSet {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    pub(crate) fn cancel_all(&mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct PlaybackSession {
    pub(crate) generation: u64,
    pub(crate) state: SessionState,
    pub(crate) stream_url: String,
    /// `None` in native playback mode and after the engine was destroyed.
    pub(crate) engine: Option<Box<dyn DeliveryEngine>>,
    pub(crate) media: Arc<dyn MediaElement>,
    pub(crate) health: BufferHealthMonitor,
    pub(crate) rate: RateController,
    pub(crate) live_edge: LiveEdgeSynchronizer,
    pub(crate) quality: QualityPolicy,
    /// Last adjustment applied on entering the `Poor` tier.
    pub(crate) defensive_adjustment: Option<DefensiveAdjustment>,
    /// Backoff retry currently scheduled, if any.
    pub(crate) pending_retry: Option<RetryKind>,
    pub(crate) timers: TimerSet,
    pub(crate) subscriptions: Vec<Subscription>,
    native: bool,
}

impl PlaybackSession {
    pub(crate) fn new(
        generation: u64,
        stream_url: String,
        engine: Option<Box<dyn DeliveryEngine>>,
        media: Arc<dyn MediaElement>,
        config: &PlayerConfig,
    ) -> Self {
        let native = engine.is_none();
        Self {
            generation,
            state: SessionState::Idle,
            stream_url,
            engine,
            media,
            health: BufferHealthMonitor::new(config.buffer_health.clone()),
            rate: RateController::new(config.rate.clone()),
            live_edge: LiveEdgeSynchronizer::new(&config.live_edge),
            quality: QualityPolicy::new(config.quality.clone()),
            defensive_adjustment: None,
            pending_retry: None,
            timers: TimerSet::new(),
            subscriptions: Vec::new(),
            native,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// Whether the media element plays the stream itself, without a delivery engine.
    pub fn is_native(&self) -> bool {
        self.native
    }

    /// Detach listeners, cancel every task and destroy the engine.
    ///
    /// Safe to call more than once. Leaves the playback rate at 1.0.
    pub(crate) fn release(&mut self) {
        let listeners = self.subscriptions.len();
        for subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
        self.timers.cancel_all();
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.pending_retry = None;
        self.media.set_playback_rate(self.rate.reset());
        debug!(
            generation = self.generation,
            listeners,
            timers_cancelled = self.timers.is_cancelled(),
            "Released playback session resources"
        );
    }

    /// Return the media element to an empty, paused state.
    pub(crate) fn reset_media(&self) {
        self.media.pause();
        self.media.set_source(None);
        self.media.load();
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("stream_url", &self.stream_url)
            .field("native", &self.native)
            .field("has_engine", &self.engine.is_some())
            .field("network", &self.health.state())
            .field("rate", &self.rate.current())
            .finish()
    }
}
