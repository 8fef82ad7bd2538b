//! # Track Catalog
//!
//! Immutable, ordered set of tracks the queue plays. Shared read-only with
//! every prefetch worker through `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Opaque track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A track and its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: Option<Duration>,
    /// Expected SHA-256 of the audio bytes, lowercase hex.
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            album: None,
            duration: None,
            content_hash: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into().to_ascii_lowercase());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Ordered, de-duplicated track collection.
///
/// The queue initializes its pending list in catalog order and plays from
/// the end, so the last track in the catalog is the first one played.
#[derive(Debug, Clone, Default)]
pub struct TrackCatalog {
    order: Vec<TrackId>,
    tracks: HashMap<TrackId, Arc<Track>>,
}

impl TrackCatalog {
    /// Builds a catalog, keeping the first occurrence of each identifier.
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut catalog = Self::default();
        for track in tracks {
            if catalog.tracks.contains_key(&track.id) {
                warn!(track_id = %track.id, "Dropping duplicate catalog entry");
                continue;
            }
            catalog.order.push(track.id.clone());
            catalog.tracks.insert(track.id.clone(), Arc::new(track));
        }
        catalog
    }

    pub fn get(&self, id: &TrackId) -> Option<Arc<Track>> {
        self.tracks.get(id).cloned()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Identifiers in catalog order.
    pub fn ids(&self) -> &[TrackId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<Track>> + '_ {
        self.order.iter().filter_map(|id| self.tracks.get(id).cloned())
    }
}

impl FromIterator<Track> for TrackCatalog {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        Self::from_tracks(iter)
    }
}
