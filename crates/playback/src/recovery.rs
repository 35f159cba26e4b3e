//! Engine error classification and recovery policy.
//!
//! [`classify`] maps an [`ErrorEvent`] onto a [`RecoveryAction`]; the session executes the
//! action. Fatal network and media errors get one fixed-backoff retry each, unrecoverable
//! errors tear the session down with no automatic retry.

use std::fmt;
use std::time::Duration;

use crate::config::RecoveryConfig;

/// Engine detail codes that describe a playhead stall rather than a failure.
pub const BUFFER_STALL_DETAILS: &[&str] =
    &["bufferStalledError", "bufferNudgeOnStall", "bufferSeekOverHole"];

/// Error type as reported by the delivery engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorType {
    Network,
    Media,
    Mux,
    Key,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Media,
    Other,
    BufferStall,
    FragmentTransient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Media => "media",
            Self::Other => "other",
            Self::BufferStall => "buffer_stall",
            Self::FragmentTransient => "fragment_transient",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub fatal: bool,
    pub details: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, fatal: bool, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal,
            details: details.into(),
        }
    }

    /// Build an event from the engine's raw error type and detail code.
    ///
    /// Non-fatal stall details become [`ErrorKind::BufferStall`] and non-fatal `frag*`
    /// details become [`ErrorKind::FragmentTransient`]; everything else follows the type.
    pub fn from_engine(
        error_type: EngineErrorType,
        fatal: bool,
        details: impl Into<String>,
    ) -> Self {
        let details = details.into();
        let kind = if !fatal && BUFFER_STALL_DETAILS.contains(&details.as_str()) {
            ErrorKind::BufferStall
        } else if !fatal && details.starts_with("frag") {
            ErrorKind::FragmentTransient
        } else {
            match error_type {
                EngineErrorType::Network => ErrorKind::Network,
                EngineErrorType::Media => ErrorKind::Media,
                EngineErrorType::Mux | EngineErrorType::Key | EngineErrorType::Other => {
                    ErrorKind::Other
                }
            }
        };
        Self {
            kind,
            fatal,
            details,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match (self.kind, self.fatal) {
            (ErrorKind::Network | ErrorKind::FragmentTransient, true) => {
                ErrorCategory::NetworkTransient
            }
            (ErrorKind::Media | ErrorKind::BufferStall, true) => ErrorCategory::MediaTransient,
            (ErrorKind::Other, true) => ErrorCategory::Unrecoverable,
            (ErrorKind::Network, false) => ErrorCategory::NetworkTransient,
            (ErrorKind::BufferStall, false) => ErrorCategory::BufferStall,
            (ErrorKind::Media | ErrorKind::Other | ErrorKind::FragmentTransient, false) => {
                ErrorCategory::FragmentTransient
            }
        }
    }
}

/// User-facing severity taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NetworkTransient,
    MediaTransient,
    Unrecoverable,
    BufferStall,
    FragmentTransient,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkTransient => "network_transient",
            Self::MediaTransient => "media_transient",
            Self::Unrecoverable => "unrecoverable",
            Self::BufferStall => "buffer_stall",
            Self::FragmentTransient => "fragment_transient",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-level retry performed after a backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryKind {
    /// `start_load()` after a fatal network error.
    RestartLoad,
    /// `recover_media_error()` after a fatal media error.
    RecoverMedia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Show an advisory banner and retry after `backoff`.
    Retry { kind: RetryKind, backoff: Duration },
    /// Destroy the engine and stop the session; the caller must restart.
    Teardown,
    /// Feed the buffer health monitor; nothing user visible.
    CountStall,
    /// Show a transient reconnecting indicator, cleared after `clear_after`.
    TransientNotice { clear_after: Duration },
    /// The engine retries internally; only log.
    LogOnly,
}

pub fn classify(event: &ErrorEvent, config: &RecoveryConfig) -> RecoveryAction {
    match event.category() {
        ErrorCategory::NetworkTransient if event.fatal => RecoveryAction::Retry {
            kind: RetryKind::RestartLoad,
            backoff: config.network_backoff(),
        },
        ErrorCategory::NetworkTransient => RecoveryAction::TransientNotice {
            clear_after: config.transient_notice(),
        },
        ErrorCategory::MediaTransient => RecoveryAction::Retry {
            kind: RetryKind::RecoverMedia,
            backoff: config.media_backoff(),
        },
        ErrorCategory::Unrecoverable => RecoveryAction::Teardown,
        ErrorCategory::BufferStall => RecoveryAction::CountStall,
        ErrorCategory::FragmentTransient => RecoveryAction::LogOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: ErrorKind, fatal: bool) -> RecoveryAction {
        classify(
            &ErrorEvent::new(kind, fatal, "test"),
            &RecoveryConfig::default(),
        )
    }

    #[test]
    fn test_fatal_network_restarts_load_after_backoff() {
        assert_eq!(
            action(ErrorKind::Network, true),
            RecoveryAction::Retry {
                kind: RetryKind::RestartLoad,
                backoff: Duration::from_millis(1000),
            }
        );
    }

    #[test]
    fn test_fatal_media_recovers_media() {
        assert!(matches!(
            action(ErrorKind::Media, true),
            RecoveryAction::Retry {
                kind: RetryKind::RecoverMedia,
                ..
            }
        ));
    }

    #[test]
    fn test_fatal_other_tears_down() {
        assert_eq!(action(ErrorKind::Other, true), RecoveryAction::Teardown);
    }

    #[test]
    fn test_non_fatal_kinds() {
        assert_eq!(action(ErrorKind::BufferStall, false), RecoveryAction::CountStall);
        assert_eq!(
            action(ErrorKind::Network, false),
            RecoveryAction::TransientNotice {
                clear_after: Duration::from_millis(2000),
            }
        );
        assert_eq!(
            action(ErrorKind::FragmentTransient, false),
            RecoveryAction::LogOnly
        );
    }

    #[test]
    fn test_fatal_stall_and_fragment_escalate() {
        assert!(matches!(
            action(ErrorKind::BufferStall, true),
            RecoveryAction::Retry {
                kind: RetryKind::RecoverMedia,
                ..
            }
        ));
        assert!(matches!(
            action(ErrorKind::FragmentTransient, true),
            RecoveryAction::Retry {
                kind: RetryKind::RestartLoad,
                ..
            }
        ));
    }

    #[test]
    fn test_from_engine_detail_mapping() {
        let stall = ErrorEvent::from_engine(EngineErrorType::Media, false, "bufferNudgeOnStall");
        assert_eq!(stall.kind, ErrorKind::BufferStall);

        let frag = ErrorEvent::from_engine(EngineErrorType::Network, false, "fragLoadTimeOut");
        assert_eq!(frag.kind, ErrorKind::FragmentTransient);

        let fatal_frag = ErrorEvent::from_engine(EngineErrorType::Network, true, "fragLoadError");
        assert_eq!(fatal_frag.kind, ErrorKind::Network);

        let manifest =
            ErrorEvent::from_engine(EngineErrorType::Network, false, "manifestLoadTimeOut");
        assert_eq!(manifest.kind, ErrorKind::Network);

        let key = ErrorEvent::from_engine(EngineErrorType::Key, true, "keyLoadError");
        assert_eq!(key.kind, ErrorKind::Other);
        assert_eq!(key.category(), ErrorCategory::Unrecoverable);
    }
}
