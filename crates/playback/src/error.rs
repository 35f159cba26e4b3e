//! Playback error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors returned by the playback controller API.
///
/// Runtime failures reported by the delivery engine are not surfaced through this type;
/// they are classified by [`crate::recovery`] and published on the status channel.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("stream URL is missing")]
    MissingStreamUrl,

    #[error("invalid stream URL `{input}`: {reason}")]
    InvalidStreamUrl { input: String, reason: String },

    #[error("media element is missing")]
    MissingMediaElement,

    #[error("no HLS stream found in broadcast playback data")]
    StreamNotFound,

    #[error("HLS playback is not supported on this device")]
    Unsupported,

    #[error("delivery engine error: {0}")]
    Engine(String),

    #[error("media element error: {0}")]
    Media(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlaybackError {
    pub fn invalid_stream_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStreamUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
