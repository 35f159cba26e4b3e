//! Stream URL resolution from broadcast playback data.
//!
//! The platform's live detail payload embeds a playback descriptor either as a JSON string
//! (`livePlaybackJson`) or as an already decoded object (`livePlayback`). The descriptor
//! lists media entries per protocol; the HLS entry carries the stream URL.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDescriptor {
    #[serde(default)]
    pub media: Vec<MediaEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaEntry {
    pub media_id: Option<String>,
    pub protocol: Option<String>,
    pub media_format: Option<String>,
    pub path: Option<String>,
}

impl MediaEntry {
    pub fn is_hls(&self) -> bool {
        self.protocol.as_deref() == Some("HLS") || self.media_format.as_deref() == Some("HLS")
    }
}

impl PlaybackDescriptor {
    /// Decode a descriptor given either as a JSON string or as an object.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(raw) => Ok(serde_json::from_str(raw)?),
            Value::Object(_) => Ok(Self::deserialize(value)?),
            _ => Err(PlaybackError::StreamNotFound),
        }
    }

    /// Path of the first HLS entry.
    pub fn hls_url(&self) -> Option<&str> {
        self.media
            .iter()
            .filter(|entry| entry.is_hls())
            .find_map(|entry| entry.path.as_deref().filter(|path| !path.is_empty()))
    }
}

/// Extract the HLS stream URL from a broadcast detail payload.
pub fn stream_url_from_broadcast(broadcast: &Value) -> Result<String> {
    let candidates = [
        broadcast.get("livePlaybackJson"),
        broadcast.pointer("/channel/livePlayback/livePlaybackJson"),
        broadcast.get("livePlayback"),
    ];

    let Some(raw) = candidates.into_iter().flatten().find(|v| is_present(v)) else {
        warn!("Broadcast payload carries no playback descriptor");
        return Err(PlaybackError::StreamNotFound);
    };

    let descriptor = PlaybackDescriptor::from_value(raw).map_err(|e| {
        warn!(error = %e, "Failed to decode playback descriptor");
        PlaybackError::StreamNotFound
    })?;

    match descriptor.hls_url() {
        Some(url) => {
            debug!(url, "Resolved HLS stream URL");
            Ok(url.to_string())
        }
        None => {
            warn!(
                entries = descriptor.media.len(),
                "Playback descriptor has no HLS entry"
            );
            Err(PlaybackError::StreamNotFound)
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
