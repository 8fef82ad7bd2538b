//! Playback bridge traits and supporting audio types.
//!
//! The engine never decodes or renders audio itself. A [`MediaLoader`]
//! turns a materialized file into a [`MediaHandle`], and a
//! [`PlaybackController`] plays that handle and reports end-of-track
//! through the [`EndOfTrackNotifier`] it was given.

use async_trait::async_trait;
use core_async::sync::mpsc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Supported audio codec identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Flac,
    Vorbis,
    Opus,
    Wav,
    Alac,
    /// Codec is unknown or not yet mapped to a dedicated variant.
    Unknown,
    /// Vendor- or platform-specific codec.
    Other(String),
}

/// Stream format reported by a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub codec: AudioCodec,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: Option<u16>,
}

impl AudioFormat {
    pub fn new(codec: AudioCodec, sample_rate: u32, channels: u16) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            bits_per_sample: None,
        }
    }

    pub fn with_bits_per_sample(mut self, bits: Option<u16>) -> Self {
        self.bits_per_sample = bits;
        self
    }
}

/// A loaded, playable media object backed by a file in slot storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub id: Uuid,
    pub path: PathBuf,
    pub format: Option<AudioFormat>,
    pub duration: Option<Duration>,
}

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            format: None,
            duration: None,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }
}

/// Unique identifier for one play-through of one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Metadata surfaced to the host's media session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackMetadata {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Artwork file written next to the audio, when one was fetched.
    pub artwork_path: Option<PathBuf>,
    pub extra: HashMap<String, String>,
}

/// Everything a controller needs to start one session.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub session: PlaybackSessionId,
    pub handle: MediaHandle,
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    pub fn new(handle: MediaHandle) -> Self {
        Self {
            session: PlaybackSessionId::new(),
            handle,
            metadata: PlaybackMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Channel end a controller uses to report that a session finished.
///
/// Cloneable; every clone reports the same session.
#[derive(Debug, Clone)]
pub struct EndOfTrackNotifier {
    session: PlaybackSessionId,
    sender: mpsc::UnboundedSender<PlaybackSessionId>,
}

impl EndOfTrackNotifier {
    pub fn new(session: PlaybackSessionId, sender: mpsc::UnboundedSender<PlaybackSessionId>) -> Self {
        Self { session, sender }
    }

    pub fn session(&self) -> PlaybackSessionId {
        self.session
    }

    /// Reports end-of-track. Returns `false` when nobody is listening anymore.
    pub fn notify(&self) -> bool {
        self.sender.send(self.session).is_ok()
    }
}

/// Turns a file in slot storage into a playable handle.
#[async_trait]
pub trait MediaLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<MediaHandle>;
}

/// Host audio engine.
#[async_trait]
pub trait PlaybackController: Send + Sync {
    /// Begin playing `request.handle`; call `on_end.notify()` when it finishes.
    async fn play(&self, request: PlaybackRequest, on_end: EndOfTrackNotifier) -> Result<()>;

    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    async fn resume(&self, session: PlaybackSessionId) -> Result<()>;

    /// Stop and discard a session. Stopping an unknown session is not an error.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    async fn is_playing(&self, session: PlaybackSessionId) -> Result<bool>;
}
