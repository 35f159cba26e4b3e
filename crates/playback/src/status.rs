//! Status broadcasting for the UI collaborator.
//!
//! The UI observes exactly one [`StatusSignal`] at a time through a `watch` channel. Signals
//! carry structured reason codes; turning them into text is the UI's job.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Why the loading indicator is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingReason {
    Connecting,
    PreparingPlayback,
    Buffering,
    Reconnecting,
}

impl LoadingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::PreparingPlayback => "preparing_playback",
            Self::Buffering => "buffering",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for LoadingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the error banner is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    MissingStreamUrl,
    InvalidStreamUrl,
    MissingMediaElement,
    StreamNotFound,
    Unsupported,
    EngineUnavailable,
    PlaybackStartFailed,
    MediaElementFailure,
    Reconnecting,
    Recovering,
    Unrecoverable,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingStreamUrl => "missing_stream_url",
            Self::InvalidStreamUrl => "invalid_stream_url",
            Self::MissingMediaElement => "missing_media_element",
            Self::StreamNotFound => "stream_not_found",
            Self::Unsupported => "unsupported",
            Self::EngineUnavailable => "engine_unavailable",
            Self::PlaybackStartFailed => "playback_start_failed",
            Self::MediaElementFailure => "media_element_failure",
            Self::Reconnecting => "reconnecting",
            Self::Recovering => "recovering",
            Self::Unrecoverable => "unrecoverable",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single externally visible playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    Loading(LoadingReason),
    /// A terminal error persists until the caller restarts playback; an advisory one is
    /// dismissed automatically.
    Error {
        reason: ErrorReason,
        terminal: bool,
    },
    Hidden,
}

impl StatusSignal {
    pub fn advisory(reason: ErrorReason) -> Self {
        Self::Error {
            reason,
            terminal: false,
        }
    }

    pub fn terminal(reason: ErrorReason) -> Self {
        Self::Error {
            reason,
            terminal: true,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl fmt::Display for StatusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading(reason) => write!(f, "loading({reason})"),
            Self::Error { reason, terminal } => {
                let kind = if *terminal { "terminal" } else { "advisory" };
                write!(f, "error({reason}, {kind})")
            }
            Self::Hidden => write!(f, "hidden"),
        }
    }
}

/// Sole writer of the status channel.
///
/// Every publication gets a revision number so delayed clears can tell whether the signal
/// they were meant to dismiss is still the one on screen.
pub struct StatusBroadcaster {
    tx: watch::Sender<StatusSignal>,
    revision: Mutex<u64>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSignal::Hidden);
        Self {
            tx,
            revision: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSignal> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StatusSignal {
        *self.tx.borrow()
    }

    /// Replace the visible signal. Returns the revision of the new signal.
    pub fn publish(&self, signal: StatusSignal) -> u64 {
        let mut revision = self.revision.lock();
        *revision += 1;
        debug!(%signal, revision = *revision, "Publishing playback status");
        self.tx.send_replace(signal);
        *revision
    }

    pub fn hide(&self) -> u64 {
        self.publish(StatusSignal::Hidden)
    }

    /// Hide the signal published at `revision` if nothing replaced it since.
    pub fn hide_if_current(&self, revision: u64) -> bool {
        let mut current = self.revision.lock();
        if *current != revision {
            return false;
        }
        *current += 1;
        debug!(revision = *current, "Dismissing playback status");
        self.tx.send_replace(StatusSignal::Hidden);
        true
    }

    /// Hide a visible loading indicator; error banners stay.
    pub fn clear_loading(&self) -> bool {
        let mut revision = self.revision.lock();
        if !self.tx.borrow().is_loading() {
            return false;
        }
        *revision += 1;
        self.tx.send_replace(StatusSignal::Hidden);
        true
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
