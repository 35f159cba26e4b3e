//! Playback controller.
//!
//! [`PlaybackController`] owns at most one [`PlaybackSession`]. Starting a stream tears the
//! previous session down, creates a delivery engine, wires engine and media listeners into a
//! per-session event pump and spawns the periodic monitors:
//!
//! - buffer health sampling, which tracks the network tier and reacts to sustained stalls;
//! - live edge synchronization, which seeks back to the live position on large drift;
//! - playback rate control, which trades latency against buffer depth.
//!
//! Every task captures the session generation when it is spawned and does nothing once the
//! generation has moved on, so late callbacks from a replaced or torn-down session are inert.
//! The session lock is never held across an await point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::config::PlayerConfig;
use crate::engine::{EngineEvent, EngineFactory, QualityLevel};
use crate::error::{PlaybackError, Result};
use crate::media::{MediaElement, MediaEvent, buffered_ahead};
use crate::monitor::buffer_health::apply_defensive_adjustment;
use crate::monitor::{
    BufferSample, DefensiveAdjustment, LatencyMeasurement, NetworkQualityState, TierTransition,
};
use crate::recovery::{ErrorEvent, RecoveryAction, RetryKind, classify};
use crate::session::{PlaybackSession, SessionState};
use crate::source::stream_url_from_broadcast;
use crate::status::{ErrorReason, LoadingReason, StatusBroadcaster, StatusSignal};

/// Events forwarded from engine and media listeners to the session's event pump.
#[derive(Debug)]
enum SessionEvent {
    Engine(EngineEvent),
    Media(MediaEvent),
}

struct Shared {
    config: PlayerConfig,
    factory: Arc<dyn EngineFactory>,
    status: StatusBroadcaster,
    generation: AtomicU64,
    session: Mutex<Option<PlaybackSession>>,
}

/// Adaptive playback controller for a single media element at a time.
///
/// Must be used from within a Tokio runtime; sessions spawn their monitors as tasks.
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(factory: Arc<dyn EngineFactory>, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                factory,
                status: StatusBroadcaster::new(),
                generation: AtomicU64::new(0),
                session: Mutex::new(None),
            }),
        })
    }

    /// Start playing `stream_url` on `media`, replacing any active session.
    ///
    /// Missing or malformed input and unsupported devices publish a terminal error status
    /// and return an error without creating a session.
    pub fn start(&self, stream_url: &str, media: Option<Arc<dyn MediaElement>>) -> Result<()> {
        let shared = &self.shared;
        let mut slot = shared.session.lock();
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(mut previous) = slot.take() {
            info!(
                previous_generation = previous.generation,
                generation, "Replacing active playback session"
            );
            previous.release();
            previous.reset_media();
        }

        let prepared = validate_stream_url(stream_url).and_then(|url| {
            let media = media.ok_or(PlaybackError::MissingMediaElement)?;
            Ok((url, media))
        });
        let (url, media) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                drop(slot);
                return Err(self.reject(e));
            }
        };

        let engine = if shared.factory.is_supported() {
            match shared.factory.create(&shared.config.engine) {
                Ok(engine) => Some(engine),
                Err(e) => {
                    drop(slot);
                    return Err(self.reject(e));
                }
            }
        } else if media.can_play_native_hls() {
            info!(generation, "Delivery engine unsupported, using native HLS playback");
            None
        } else {
            drop(slot);
            return Err(self.reject(PlaybackError::Unsupported));
        };

        let mut session = PlaybackSession::new(
            generation,
            url.clone(),
            engine,
            Arc::clone(&media),
            &shared.config,
        );
        media.set_playback_rate(session.rate.current());

        let (tx, rx) = mpsc::unbounded_channel();
        let media_tx = tx.clone();
        session.subscriptions.push(media.subscribe(Arc::new(move |event: MediaEvent| {
            let _ = media_tx.send(SessionEvent::Media(event));
        })));

        match session.engine.as_deref_mut() {
            Some(engine) => {
                session.subscriptions.push(engine.subscribe(Arc::new(move |event: EngineEvent| {
                    let _ = tx.send(SessionEvent::Engine(event));
                })));
                engine.load_source(&url);
                engine.attach_media(Arc::clone(&media));
            }
            None => {
                drop(tx);
                media.set_source(Some(&url));
                media.load();
            }
        }

        spawn_event_pump(shared, &mut session, rx);
        spawn_periodic(
            shared,
            &mut session,
            shared.config.buffer_health.sample_interval(),
            Shared::on_buffer_tick,
        );
        spawn_periodic(
            shared,
            &mut session,
            shared.config.live_edge.check_interval(),
            Shared::on_live_edge_tick,
        );
        spawn_periodic(
            shared,
            &mut session,
            shared.config.rate.adjust_interval(),
            Shared::on_rate_tick,
        );

        session.state = SessionState::Loading;
        info!(
            generation,
            url = %url,
            native = session.is_native(),
            "Started playback session"
        );
        *slot = Some(session);
        drop(slot);

        shared
            .status
            .publish(StatusSignal::Loading(LoadingReason::Connecting));
        Ok(())
    }

    /// Resolve the HLS stream of a broadcast record and start it.
    pub fn start_broadcast(
        &self,
        broadcast: &Value,
        media: Option<Arc<dyn MediaElement>>,
    ) -> Result<()> {
        match stream_url_from_broadcast(broadcast) {
            Ok(url) => self.start(&url, media),
            Err(e) => {
                self.stop();
                Err(self.reject(e))
            }
        }
    }

    /// Stop playback and release every session resource. Idempotent.
    pub fn stop(&self) {
        let mut slot = self.shared.session.lock();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match slot.take() {
            Some(mut session) => {
                session.release();
                session.reset_media();
                info!(
                    session_generation = session.generation,
                    generation,
                    url = session.stream_url(),
                    "Stopped playback session"
                );
            }
            None => debug!(generation, "Stop requested with no active session"),
        }
        drop(slot);
        self.shared.status.hide();
    }

    pub fn state(&self) -> SessionState {
        self.shared
            .session
            .lock()
            .as_ref()
            .map_or(SessionState::Idle, |session| session.state)
    }

    /// Current session generation; bumped on every start, stop and fatal teardown.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn network_quality(&self) -> Option<NetworkQualityState> {
        self.shared
            .session
            .lock()
            .as_ref()
            .map(|session| session.health.state())
    }

    /// Buffer and level-cap change made when the network last degraded to `Poor`.
    pub fn defensive_adjustment(&self) -> Option<DefensiveAdjustment> {
        self.shared
            .session
            .lock()
            .as_ref()
            .and_then(|session| session.defensive_adjustment)
    }

    /// Playback rate the controller last applied.
    pub fn playback_rate(&self) -> f64 {
        self.shared
            .session
            .lock()
            .as_ref()
            .map_or(1.0, |session| session.rate.current())
    }

    pub fn status(&self) -> watch::Receiver<StatusSignal> {
        self.shared.status.subscribe()
    }

    pub fn current_status(&self) -> StatusSignal {
        self.shared.status.current()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    fn reject(&self, err: PlaybackError) -> PlaybackError {
        let reason = match &err {
            PlaybackError::MissingStreamUrl => ErrorReason::MissingStreamUrl,
            PlaybackError::InvalidStreamUrl { .. } => ErrorReason::InvalidStreamUrl,
            PlaybackError::MissingMediaElement => ErrorReason::MissingMediaElement,
            PlaybackError::StreamNotFound | PlaybackError::Serialization(_) => {
                ErrorReason::StreamNotFound
            }
            PlaybackError::Unsupported => ErrorReason::Unsupported,
            _ => ErrorReason::EngineUnavailable,
        };
        error!(error = %err, reason = %reason, "Unable to start playback");
        self.shared.status.publish(StatusSignal::terminal(reason));
        err
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if self.shared.session.lock().is_some() {
            self.stop();
        }
    }
}

fn validate_stream_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PlaybackError::MissingStreamUrl);
    }
    let url = Url::parse(trimmed)
        .map_err(|e| PlaybackError::invalid_stream_url(trimmed, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        other => Err(PlaybackError::invalid_stream_url(
            trimmed,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

// --- Session task plumbing ---

impl Shared {
    /// Run `f` against the active session if `generation` is still current.
    fn with_session<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut PlaybackSession) -> R,
    ) -> Option<R> {
        let mut slot = self.session.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        let session = slot.as_mut().filter(|s| s.generation == generation)?;
        Some(f(session))
    }
}

fn spawn_event_pump(
    shared: &Arc<Shared>,
    session: &mut PlaybackSession,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
) {
    let weak = Arc::downgrade(shared);
    let token = session.timers.token();
    let generation = session.generation;
    let handle = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let Some(shared) = weak.upgrade() else { break };
            let handled =
                shared.with_session(generation, |session| shared.on_event(session, event));
            if handled.is_none() {
                break;
            }
        }
        trace!(generation, "Session event pump finished");
    });
    session.timers.track(handle);
}

fn spawn_periodic(
    shared: &Arc<Shared>,
    session: &mut PlaybackSession,
    period: Duration,
    mut tick: impl FnMut(&Arc<Shared>, &mut PlaybackSession) + Send + 'static,
) {
    let weak = Arc::downgrade(shared);
    let token = session.timers.token();
    let generation = session.generation;
    let handle = tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let Some(shared) = weak.upgrade() else { break };
                    if shared.with_session(generation, |session| tick(&shared, session)).is_none() {
                        break;
                    }
                }
            }
        }
    });
    session.timers.track(handle);
}

fn spawn_delayed(
    shared: &Arc<Shared>,
    session: &mut PlaybackSession,
    delay: Duration,
    task: impl FnOnce(&Arc<Shared>, &mut PlaybackSession) + Send + 'static,
) {
    let weak = Arc::downgrade(shared);
    let token = session.timers.token();
    let generation = session.generation;
    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = time::sleep(delay) => {
                if let Some(shared) = weak.upgrade() {
                    shared.with_session(generation, |session| task(&shared, session));
                }
            }
        }
    });
    session.timers.track(handle);
}

fn spawn_play(shared: &Arc<Shared>, session: &mut PlaybackSession) {
    let weak = Arc::downgrade(shared);
    let token = session.timers.token();
    let generation = session.generation;
    let media = Arc::clone(&session.media);
    let handle = tokio::spawn(async move {
        let result = tokio::select! {
            _ = token.cancelled() => return,
            result = media.play() => result,
        };
        if let Some(shared) = weak.upgrade() {
            shared.with_session(generation, |session| shared.on_play_result(session, result));
        }
    });
    session.timers.track(handle);
}

// --- Event handling ---

impl Shared {
    fn on_event(self: &Arc<Self>, session: &mut PlaybackSession, event: SessionEvent) {
        match event {
            SessionEvent::Engine(EngineEvent::ManifestParsed { levels }) => {
                self.on_manifest_parsed(session, &levels);
            }
            SessionEvent::Engine(EngineEvent::BufferAppended) => {
                if session.media.is_paused() {
                    return;
                }
                if session.state == SessionState::Recovering {
                    info!(generation = session.generation, "Segments flowing again, recovered");
                    session.state = SessionState::Playing;
                }
                if self.status.clear_loading() {
                    trace!(generation = session.generation, "Buffer appended, loading cleared");
                }
            }
            SessionEvent::Engine(EngineEvent::Error(event)) => {
                self.on_engine_error(session, event);
            }
            SessionEvent::Media(event) => self.on_media_event(session, event),
        }
    }

    fn on_manifest_parsed(
        self: &Arc<Self>,
        session: &mut PlaybackSession,
        levels: &[QualityLevel],
    ) {
        debug!(
            generation = session.generation,
            levels = levels.len(),
            "Manifest parsed"
        );
        self.status
            .publish(StatusSignal::Loading(LoadingReason::PreparingPlayback));

        let pinned = match session.engine.as_deref_mut() {
            // Some engines only expose the ladder through their own state.
            Some(engine) if levels.is_empty() => {
                let ladder = engine.levels();
                session.quality.on_manifest_parsed(engine, &ladder)
            }
            Some(engine) => session.quality.on_manifest_parsed(engine, levels),
            None => None,
        };
        if pinned.is_some() {
            spawn_delayed(
                self,
                session,
                self.config.quality.warmup(),
                |_, session| {
                    if let Some(engine) = session.engine.as_deref_mut() {
                        session.quality.release(engine);
                    }
                },
            );
        }
        spawn_play(self, session);
    }

    fn on_play_result(self: &Arc<Self>, session: &mut PlaybackSession, result: Result<()>) {
        match result {
            Ok(()) => {
                debug!(generation = session.generation, "Playback started");
                if session.state == SessionState::Loading {
                    session.state = SessionState::Playing;
                }
                self.status.hide();
            }
            Err(e) => {
                warn!(generation = session.generation, error = %e, "Media element refused to play");
                self.publish_advisory(session, ErrorReason::PlaybackStartFailed);
            }
        }
    }

    fn on_media_event(self: &Arc<Self>, session: &mut PlaybackSession, event: MediaEvent) {
        let generation = session.generation;
        match event {
            MediaEvent::LoadStart => {
                self.status
                    .publish(StatusSignal::Loading(LoadingReason::Connecting));
            }
            MediaEvent::LoadedMetadata => {
                if session.is_native() {
                    debug!(generation, "Native metadata loaded, starting playback");
                    spawn_play(self, session);
                }
            }
            MediaEvent::Waiting => {
                if session.state != SessionState::Recovering {
                    session.state = SessionState::Buffering;
                }
                self.status
                    .publish(StatusSignal::Loading(LoadingReason::Buffering));
            }
            MediaEvent::Playing => {
                session.state = SessionState::Playing;
                self.status.hide();
            }
            MediaEvent::Pause => trace!(generation, "Media paused"),
            MediaEvent::Ended => {
                debug!(generation, "Media ended");
                self.status.hide();
            }
            MediaEvent::Error { code } => {
                warn!(generation, code = ?code, "Media element reported an error");
                self.publish_advisory(session, ErrorReason::MediaElementFailure);
            }
        }
    }

    fn on_engine_error(self: &Arc<Self>, session: &mut PlaybackSession, event: ErrorEvent) {
        let generation = session.generation;
        match classify(&event, &self.config.recovery) {
            RecoveryAction::Retry { kind, backoff } => {
                warn!(
                    generation,
                    kind = %event.kind,
                    details = %event.details,
                    backoff_ms = backoff.as_millis() as u64,
                    "Fatal engine error, scheduling recovery"
                );
                session.state = SessionState::Recovering;
                let reason = match kind {
                    RetryKind::RestartLoad => ErrorReason::Reconnecting,
                    RetryKind::RecoverMedia => ErrorReason::Recovering,
                };
                self.publish_advisory(session, reason);

                if session.pending_retry == Some(kind) {
                    debug!(generation, ?kind, "Recovery already pending");
                    return;
                }
                session.pending_retry = Some(kind);
                spawn_delayed(self, session, backoff, move |_, session| {
                    session.pending_retry = None;
                    let Some(engine) = session.engine.as_deref_mut() else {
                        return;
                    };
                    info!(generation = session.generation, ?kind, "Attempting recovery");
                    match kind {
                        RetryKind::RestartLoad => engine.start_load(),
                        RetryKind::RecoverMedia => engine.recover_media_error(),
                    }
                });
            }
            RecoveryAction::Teardown => {
                error!(
                    generation,
                    kind = %event.kind,
                    details = %event.details,
                    "Unrecoverable engine error, tearing down session"
                );
                self.teardown(session);
                self.status
                    .publish(StatusSignal::terminal(ErrorReason::Unrecoverable));
            }
            RecoveryAction::CountStall => {
                debug!(generation, details = %event.details, "Engine reported buffer stall");
                if let Some(transition) = session.health.record_stall(Instant::now()) {
                    self.on_tier_transition(session, transition);
                }
            }
            RecoveryAction::TransientNotice { clear_after } => {
                debug!(generation, details = %event.details, "Transient network error");
                let revision = self
                    .status
                    .publish(StatusSignal::Loading(LoadingReason::Reconnecting));
                spawn_delayed(self, session, clear_after, move |shared, _| {
                    shared.status.hide_if_current(revision);
                });
            }
            RecoveryAction::LogOnly => {
                debug!(
                    generation,
                    kind = %event.kind,
                    details = %event.details,
                    "Non-fatal engine error, engine retries internally"
                );
            }
        }
    }

    /// Tear down after an unrecoverable error. The session stays in place as `Stopped`.
    fn teardown(&self, session: &mut PlaybackSession) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        session.release();
        session.state = SessionState::Stopped;
    }

    fn publish_advisory(self: &Arc<Self>, session: &mut PlaybackSession, reason: ErrorReason) {
        let revision = self.status.publish(StatusSignal::advisory(reason));
        spawn_delayed(
            self,
            session,
            self.config.status.advisory_banner(),
            move |shared, _| {
                shared.status.hide_if_current(revision);
            },
        );
    }

    fn on_tier_transition(&self, session: &mut PlaybackSession, transition: TierTransition) {
        info!(
            generation = session.generation,
            from = %transition.from,
            to = %transition.to,
            stall_count = session.health.state().stall_count,
            "Network quality changed"
        );
        if !transition.entered_poor() {
            return;
        }
        let Some(engine) = session.engine.as_deref_mut() else {
            return;
        };
        let adjustment =
            apply_defensive_adjustment(engine, self.config.buffer_health.buffer_widen_factor);
        info!(
            generation = session.generation,
            max_buffer_length_secs = adjustment.buffer_targets.max_buffer_length_secs,
            max_buffer_size_bytes = adjustment.buffer_targets.max_buffer_size_bytes,
            level_cap = ?adjustment.level_cap,
            "Network quality poor, applied defensive buffering"
        );
        session.defensive_adjustment = Some(adjustment);
    }

    // --- Monitor ticks ---

    fn on_buffer_tick(self: &Arc<Self>, session: &mut PlaybackSession) {
        if !session.state.is_streaming() {
            return;
        }
        let sample = BufferSample::capture(session.media.as_ref(), Instant::now());
        trace!(
            generation = session.generation,
            buffered_secs = sample.buffered_secs,
            current_time = sample.current_time,
            "Buffer sample"
        );
        if let Some(transition) = session.health.observe(sample) {
            self.on_tier_transition(session, transition);
        }
    }

    fn on_live_edge_tick(self: &Arc<Self>, session: &mut PlaybackSession) {
        if !session.state.is_streaming() || session.media.is_paused() || session.media.is_seeking()
        {
            return;
        }
        let Some(engine) = session.engine.as_deref() else {
            return;
        };
        let latency = LatencyMeasurement::read(engine);
        if let Some(position) = session
            .live_edge
            .seek_target(latency, engine.live_sync_position())
        {
            session.media.set_current_time(position);
        }
    }

    fn on_rate_tick(self: &Arc<Self>, session: &mut PlaybackSession) {
        if !session.state.is_active() || session.media.is_paused() {
            return;
        }
        let buffered = buffered_ahead(&session.media.buffered(), session.media.current_time());
        let latency = session
            .engine
            .as_deref()
            .and_then(|engine| LatencyMeasurement::read(engine));
        if let Some(rate) = session.rate.evaluate(buffered, latency) {
            session.media.set_playback_rate(rate);
        }
    }
}
