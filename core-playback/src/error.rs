//! # Playback Error Types
//!
//! Errors surfaced by the queue engine. Per-fetch failures (network,
//! certificate, storage) leave a slot stale and are reported to whoever
//! joins the worker; they only abort navigation when they hit the CURRENT
//! slot.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during queue navigation and slot materialization.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Media source rejected the session. Fatal to starting playback.
    #[error("Not authorized to resolve track {track_id}: {message}")]
    Auth { track_id: String, message: String },

    /// Locator resolution or byte download failed.
    #[error("Failed to fetch track {track_id}: {message}")]
    NetworkFetch { track_id: String, message: String },

    /// TLS certificate verification failed while fetching.
    #[error("Certificate error fetching track {track_id}: {message}")]
    Certificate { track_id: String, message: String },

    /// Reading, writing or releasing slot storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Loader could not turn stored bytes into a playable handle.
    #[error("Failed to load track {track_id}: {message}")]
    Decode { track_id: String, message: String },

    /// Playback controller rejected a command.
    #[error("Playback controller error: {0}")]
    Playback(String),

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// Illegal call for the navigator's lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// CURRENT slot has no materialized content for its bound track.
    #[error("Track {0} is not ready for playback")]
    NotReady(String),

    #[error("Track not found in catalog: {0}")]
    TrackNotFound(String),

    // ========================================================================
    // Worker Outcomes
    // ========================================================================
    /// Slot was rebound or released while the worker ran; its result was discarded.
    #[error("Materialization of track {0} was superseded")]
    Superseded(String),

    #[error("Materialization of track {0} was cancelled")]
    Cancelled(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Maps a capability failure that happened while working on `track_id`.
    pub fn from_bridge(track_id: &str, error: BridgeError) -> Self {
        let track_id = track_id.to_string();
        match error {
            BridgeError::Unauthorized(message) | BridgeError::PermissionDenied(message) => {
                PlaybackError::Auth { track_id, message }
            }
            BridgeError::Certificate(message) => PlaybackError::Certificate { track_id, message },
            BridgeError::Io(err) => PlaybackError::Storage(err.to_string()),
            other => PlaybackError::NetworkFetch {
                track_id,
                message: other.to_string(),
            },
        }
    }

    /// Returns `true` if a later attempt on the same track may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkFetch { .. }
                | PlaybackError::Storage(_)
                | PlaybackError::Superseded(_)
                | PlaybackError::Cancelled(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkFetch { .. } | PlaybackError::Certificate { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
