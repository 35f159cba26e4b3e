//! Recording test doubles for the delivery engine and media element.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use playback::config::EngineConfig;
use playback::engine::{BufferTargets, EngineListener};
use playback::media::{MediaListener, ReadyState};
use playback::recovery::ErrorEvent;
use playback::{
    DeliveryEngine, EngineEvent, EngineFactory, LevelSelection, MediaElement, MediaEvent,
    PlaybackError, QualityLevel, Result, Subscription, TimeRange,
};

pub const STREAM_URL: &str = "https://cdn.example.com/live/abc/playlist.m3u8";

/// Calls made on any collaborator, in order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.0.lock().iter().position(|c| c == call)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

// --- Engine ---

pub struct EngineState {
    pub listener: Option<EngineListener>,
    pub latency: Option<f64>,
    pub target_latency: Option<f64>,
    pub live_sync_position: Option<f64>,
    pub levels: Vec<QualityLevel>,
    pub current_level: Option<usize>,
    pub cap: Option<usize>,
    pub targets: BufferTargets,
    pub destroyed: bool,
}

/// Test-side handle to an engine the factory created.
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<Mutex<EngineState>>,
}

impl EngineHandle {
    pub fn emit(&self, event: EngineEvent) {
        let listener = self.state.lock().listener.clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    pub fn emit_error(&self, event: ErrorEvent) {
        self.emit(EngineEvent::Error(event));
    }

    pub fn set_latency(&self, latency: f64, target: f64) {
        let mut state = self.state.lock();
        state.latency = Some(latency);
        state.target_latency = Some(target);
    }

    pub fn set_live_sync_position(&self, position: f64) {
        self.state.lock().live_sync_position = Some(position);
    }

    pub fn set_levels(&self, levels: Vec<QualityLevel>) {
        self.state.lock().levels = levels;
    }

    pub fn set_current_level(&self, level: usize) {
        self.state.lock().current_level = Some(level);
    }

    pub fn cap(&self) -> Option<usize> {
        self.state.lock().cap
    }

    pub fn targets(&self) -> BufferTargets {
        self.state.lock().targets
    }

    pub fn has_listener(&self) -> bool {
        self.state.lock().listener.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }
}

pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
    log: CallLog,
}

impl DeliveryEngine for FakeEngine {
    fn load_source(&mut self, url: &str) {
        self.log.push(format!("engine.load_source({url})"));
    }

    fn attach_media(&mut self, _media: Arc<dyn MediaElement>) {
        self.log.push("engine.attach_media");
    }

    fn start_load(&mut self) {
        self.log.push("engine.start_load");
    }

    fn recover_media_error(&mut self) {
        self.log.push("engine.recover_media_error");
    }

    fn destroy(&mut self) {
        self.log.push("engine.destroy");
        let mut state = self.state.lock();
        state.destroyed = true;
        state.listener = None;
    }

    fn subscribe(&mut self, listener: EngineListener) -> Subscription {
        self.log.push("engine.subscribe");
        self.state.lock().listener = Some(listener);
        let state = Arc::clone(&self.state);
        let log = self.log.clone();
        Subscription::new(move || {
            log.push("engine.unsubscribe");
            state.lock().listener = None;
        })
    }

    fn latency(&self) -> Option<f64> {
        self.state.lock().latency
    }

    fn target_latency(&self) -> Option<f64> {
        self.state.lock().target_latency
    }

    fn live_sync_position(&self) -> Option<f64> {
        self.state.lock().live_sync_position
    }

    fn levels(&self) -> Vec<QualityLevel> {
        self.state.lock().levels.clone()
    }

    fn current_level(&self) -> Option<usize> {
        self.state.lock().current_level
    }

    fn set_current_level(&mut self, selection: LevelSelection) {
        self.log.push(format!("engine.set_current_level({selection})"));
        if let LevelSelection::Fixed(index) = selection {
            self.state.lock().current_level = Some(index);
        }
    }

    fn auto_level_capping(&self) -> Option<usize> {
        self.state.lock().cap
    }

    fn set_auto_level_capping(&mut self, cap: Option<usize>) {
        self.log.push(format!("engine.set_auto_level_capping({cap:?})"));
        self.state.lock().cap = cap;
    }

    fn buffer_targets(&self) -> BufferTargets {
        self.state.lock().targets
    }

    fn set_buffer_targets(&mut self, targets: BufferTargets) {
        self.log.push("engine.set_buffer_targets");
        self.state.lock().targets = targets;
    }
}

pub struct FakeFactory {
    supported: bool,
    fail_create: bool,
    log: CallLog,
    engines: Mutex<Vec<EngineHandle>>,
}

impl FakeFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            supported: true,
            fail_create: false,
            log,
            engines: Mutex::new(Vec::new()),
        }
    }

    pub fn unsupported(log: CallLog) -> Self {
        Self {
            supported: false,
            ..Self::new(log)
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self {
            fail_create: true,
            ..Self::new(log)
        }
    }

    /// Most recently created engine.
    pub fn engine(&self) -> EngineHandle {
        self.engines
            .lock()
            .last()
            .cloned()
            .expect("no engine created")
    }

    pub fn engines(&self) -> Vec<EngineHandle> {
        self.engines.lock().clone()
    }
}

impl EngineFactory for FakeFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, config: &EngineConfig) -> Result<Box<dyn DeliveryEngine>> {
        self.log.push("factory.create");
        if self.fail_create {
            return Err(PlaybackError::engine("worker failed to start"));
        }
        let state = Arc::new(Mutex::new(EngineState {
            listener: None,
            latency: None,
            target_latency: None,
            live_sync_position: None,
            levels: Vec::new(),
            current_level: None,
            cap: None,
            targets: BufferTargets::from(config),
            destroyed: false,
        }));
        self.engines.lock().push(EngineHandle {
            state: Arc::clone(&state),
        });
        Ok(Box::new(FakeEngine {
            state,
            log: self.log.clone(),
        }))
    }
}

// --- Media element ---

struct MediaState {
    listener: Option<MediaListener>,
    current_time: f64,
    rate: f64,
    buffered: Vec<TimeRange>,
    paused: bool,
    seeking: bool,
    source: Option<String>,
    refuse_play: bool,
}

pub struct FakeMedia {
    state: Arc<Mutex<MediaState>>,
    native_hls: bool,
    log: CallLog,
}

impl FakeMedia {
    pub fn new(log: CallLog) -> Arc<Self> {
        Self::build(log, false)
    }

    pub fn native(log: CallLog) -> Arc<Self> {
        Self::build(log, true)
    }

    fn build(log: CallLog, native_hls: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(MediaState {
                listener: None,
                current_time: 0.0,
                rate: 1.0,
                buffered: Vec::new(),
                paused: true,
                seeking: false,
                source: None,
                refuse_play: false,
            })),
            native_hls,
            log,
        })
    }

    pub fn emit(&self, event: MediaEvent) {
        let listener = self.state.lock().listener.clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    /// Buffer `secs` ahead of the current playhead.
    pub fn set_buffered_ahead(&self, secs: f64) {
        let mut state = self.state.lock();
        let start = state.current_time;
        state.buffered = vec![TimeRange::new(start, start + secs)];
    }

    pub fn refuse_play(&self) {
        self.state.lock().refuse_play = true;
    }

    pub fn rate(&self) -> f64 {
        self.state.lock().rate
    }

    pub fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    pub fn has_listener(&self) -> bool {
        self.state.lock().listener.is_some()
    }

    pub fn time(&self) -> f64 {
        self.state.lock().current_time
    }
}

#[async_trait]
impl MediaElement for FakeMedia {
    async fn play(&self) -> Result<()> {
        self.log.push("media.play");
        {
            let mut state = self.state.lock();
            if state.refuse_play {
                return Err(PlaybackError::media("play() request was rejected"));
            }
            state.paused = false;
        }
        self.emit(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        self.log.push("media.pause");
        self.state.lock().paused = true;
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, time: f64) {
        self.log.push(format!("media.set_current_time({time})"));
        self.state.lock().current_time = time;
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.log.push(format!("media.set_playback_rate({rate})"));
        self.state.lock().rate = rate;
    }

    fn buffered(&self) -> Vec<TimeRange> {
        self.state.lock().buffered.clone()
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn is_seeking(&self) -> bool {
        self.state.lock().seeking
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn set_source(&self, url: Option<&str>) {
        self.log.push(format!("media.set_source({url:?})"));
        self.state.lock().source = url.map(str::to_owned);
    }

    fn load(&self) {
        self.log.push("media.load");
    }

    fn can_play_native_hls(&self) -> bool {
        self.native_hls
    }

    fn subscribe(&self, listener: MediaListener) -> Subscription {
        self.log.push("media.subscribe");
        self.state.lock().listener = Some(listener);
        let state = Arc::clone(&self.state);
        let log = self.log.clone();
        Subscription::new(move || {
            log.push("media.unsubscribe");
            state.lock().listener = None;
        })
    }
}

/// Let spawned session tasks drain their queues.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time by `ms` and let tasks run.
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

mod harness;
pub use harness::Harness;
