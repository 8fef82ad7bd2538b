//! # Buffer Slots
//!
//! A [`BufferSlot`] is one of the three physical storage areas the queue
//! rotates through. It holds at most one materialized track: the audio bytes
//! (and optional artwork) written under its own directory plus the handle the
//! loader produced from them.
//!
//! Every rebind or release bumps the slot's generation. Workers capture the
//! generation they were started for and only commit when it still matches,
//! so a slow fetch for a track the slot no longer holds is discarded instead
//! of overwriting newer state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::playback::MediaHandle;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::FetchResponse;
use chrono::{DateTime, Utc};
use core_async::io::{AsyncReadExt, AsyncWriteExt};
use core_async::sync::{CancellationToken, Mutex as StorageLock};
use core_async::time::{timeout, Instant};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::catalog::{Track, TrackId};
use crate::config::PrefetchConfig;
use crate::error::{PlaybackError, Result};
use crate::prefetch::PrefetchContext;

/// Result of binding a track to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Slot already held this track; content and freshness are untouched.
    Reused,
    /// Slot now holds a different track and must be refreshed.
    Rebound { generation: u64 },
}

/// Work order for refreshing a stale slot.
#[derive(Debug, Clone)]
pub struct MaterializeJob {
    pub track: Arc<Track>,
    pub generation: u64,
}

/// How a materialization attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// Content committed to the slot.
    Ready { bytes: u64 },
    /// Slot was rebound or released first; nothing was committed.
    Superseded,
    /// Cancellation was requested before the work finished.
    Cancelled,
}

/// Playable content of a fresh slot.
#[derive(Debug, Clone)]
pub struct ReadyContent {
    pub track: Arc<Track>,
    pub handle: MediaHandle,
    pub artwork_path: Option<PathBuf>,
}

/// Point-in-time view of a slot for diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub number: u8,
    /// Track bound for the slot's current role, `None` when empty or parked.
    pub track_id: Option<TrackId>,
    pub parked: bool,
    pub stale: bool,
    pub ready: bool,
    pub generation: u64,
    pub materialized_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub storage_dir: PathBuf,
}

#[derive(Debug, Default)]
struct SlotState {
    track: Option<Arc<Track>>,
    /// No role currently wants a track here; the old content is kept so that
    /// rebinding the same track is free.
    parked: bool,
    stale: bool,
    generation: u64,
    handle: Option<MediaHandle>,
    artwork_path: Option<PathBuf>,
    materialized_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    released: bool,
}

/// One of the three rotating storage areas.
#[derive(Debug)]
pub struct BufferSlot {
    number: u8,
    storage_dir: PathBuf,
    audio_path: PathBuf,
    artwork_path: PathBuf,
    state: Mutex<SlotState>,
    /// Serializes every operation touching the slot's files.
    storage_lock: StorageLock<()>,
}

impl BufferSlot {
    /// Creates an empty slot. `number` is 1-based.
    pub fn new(number: u8, root: &Path, config: &PrefetchConfig) -> Self {
        let storage_dir = config.slot_directory(root, number as usize);
        Self {
            number,
            audio_path: storage_dir.join(&config.audio_file_name),
            artwork_path: storage_dir.join(&config.artwork_file_name),
            storage_dir,
            state: Mutex::new(SlotState::default()),
            storage_lock: StorageLock::new(()),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().stale
    }

    pub fn is_parked(&self) -> bool {
        self.state.lock().parked
    }

    /// Binds `track` to the slot.
    ///
    /// Binding the track the slot already holds (even while parked) keeps the
    /// existing content. Any other track marks the slot stale and starts a
    /// new generation.
    pub fn bind(&self, track: Arc<Track>) -> BindOutcome {
        let mut state = self.state.lock();
        state.parked = false;

        if state.track.as_ref().map(|held| &held.id) == Some(&track.id) {
            return BindOutcome::Reused;
        }

        state.track = Some(track);
        state.stale = true;
        state.handle = None;
        state.artwork_path = None;
        state.materialized_at = None;
        state.last_error = None;
        state.generation += 1;
        BindOutcome::Rebound {
            generation: state.generation,
        }
    }

    /// Marks the slot as holding no track for its role.
    pub fn park(&self) {
        self.state.lock().parked = true;
    }

    /// Track bound for the slot's current role.
    pub fn bound_track(&self) -> Option<Arc<Track>> {
        let state = self.state.lock();
        if state.parked {
            None
        } else {
            state.track.clone()
        }
    }

    /// Returns the job needed to refresh this slot, if any.
    pub fn pending_job(&self) -> Option<MaterializeJob> {
        let state = self.state.lock();
        if state.released || state.parked || !state.stale {
            return None;
        }
        state.track.as_ref().map(|track| MaterializeJob {
            track: Arc::clone(track),
            generation: state.generation,
        })
    }

    /// Content for the bound track, or `None` while the slot is stale.
    pub fn ready_content(&self) -> Option<ReadyContent> {
        let state = self.state.lock();
        if state.stale || state.parked {
            return None;
        }
        match (&state.track, &state.handle) {
            (Some(track), Some(handle)) => Some(ReadyContent {
                track: Arc::clone(track),
                handle: handle.clone(),
                artwork_path: state.artwork_path.clone(),
            }),
            _ => None,
        }
    }

    pub fn ready_handle(&self) -> Option<MediaHandle> {
        self.ready_content().map(|content| content.handle)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let state = self.state.lock();
        SlotSnapshot {
            number: self.number,
            track_id: if state.parked {
                None
            } else {
                state.track.as_ref().map(|track| track.id.clone())
            },
            parked: state.parked,
            stale: state.stale,
            ready: !state.stale && state.handle.is_some(),
            generation: state.generation,
            materialized_at: state.materialized_at,
            last_error: state.last_error.clone(),
            storage_dir: self.storage_dir.clone(),
        }
    }

    fn holds_generation(&self, generation: u64) -> bool {
        let state = self.state.lock();
        !state.released && state.generation == generation
    }

    /// Downloads, stores and loads the job's track into this slot.
    ///
    /// Returns `Ok(Superseded)` when the slot moved on to another generation
    /// and `Ok(Cancelled)` when `cancel` fired first. Errors are recorded on
    /// the slot only if it still holds the job's generation.
    #[instrument(
        skip_all,
        fields(slot = self.number, track_id = %job.track.id, generation = job.generation)
    )]
    pub async fn materialize(
        &self,
        job: &MaterializeJob,
        ctx: &PrefetchContext,
        cancel: &CancellationToken,
    ) -> Result<MaterializeOutcome> {
        let _storage = core_async::select! {
            guard = self.storage_lock.lock() => guard,
            _ = cancel.cancelled() => return Ok(MaterializeOutcome::Cancelled),
        };

        if !self.holds_generation(job.generation) {
            debug!("Slot rebound before work started");
            return Ok(MaterializeOutcome::Superseded);
        }

        let work = async {
            match ctx.config.fetch_timeout() {
                Some(limit) => timeout(limit, self.fetch_and_load(job, ctx))
                    .await
                    .unwrap_or_else(|_| {
                        Err(PlaybackError::NetworkFetch {
                            track_id: job.track.id.to_string(),
                            message: format!("timed out after {:?}", limit),
                        })
                    }),
                None => self.fetch_and_load(job, ctx).await,
            }
        };

        let result = core_async::select! {
            result = work => result,
            _ = cancel.cancelled() => return Ok(MaterializeOutcome::Cancelled),
        };

        match result {
            Ok(fetched) => Ok(self.commit(job.generation, fetched)),
            Err(error) => {
                let mut state = self.state.lock();
                if state.released || state.generation != job.generation {
                    return Ok(MaterializeOutcome::Superseded);
                }
                state.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn fetch_and_load(&self, job: &MaterializeJob, ctx: &PrefetchContext) -> Result<Fetched> {
        let track_id = job.track.id.as_str();
        let started = Instant::now();

        ctx.file_system
            .create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| storage_error("create slot directory", e))?;

        let locator = ctx
            .media_source
            .resolve_locator(track_id)
            .await
            .map_err(|e| PlaybackError::from_bridge(track_id, e))?;
        debug!(url = %redact_url(&locator.url), "Resolved media locator");

        let response = ctx
            .content_fetcher
            .fetch(&locator)
            .await
            .map_err(|e| PlaybackError::from_bridge(track_id, e))?;

        let (bytes, digest) = self.write_audio(track_id, response, ctx).await?;

        if ctx.config.verify_integrity {
            if let Some(expected) = &job.track.content_hash {
                if *expected != digest {
                    return Err(PlaybackError::NetworkFetch {
                        track_id: track_id.to_string(),
                        message: format!("content hash mismatch: expected {}, got {}", expected, digest),
                    });
                }
            }
        }

        let artwork_path = if ctx.config.fetch_artwork {
            self.fetch_artwork(track_id, ctx).await
        } else {
            None
        };

        let handle = ctx
            .media_loader
            .load(&self.audio_path)
            .await
            .map_err(|e| PlaybackError::Decode {
                track_id: track_id.to_string(),
                message: e.to_string(),
            })?;

        debug!(
            bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Slot content loaded"
        );

        Ok(Fetched {
            bytes,
            handle,
            artwork_path,
        })
    }

    /// Streams the body into the audio file. Returns byte count and SHA-256 hex digest.
    async fn write_audio(
        &self,
        track_id: &str,
        response: FetchResponse,
        ctx: &PrefetchContext,
    ) -> Result<(u64, String)> {
        let FetchResponse {
            mut stream,
            content_length,
        } = response;

        let mut writer = ctx
            .file_system
            .open_write_stream(&self.audio_path)
            .await
            .map_err(|e| storage_error("open audio file", e))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; ctx.config.copy_buffer_size];
        let mut total = 0u64;

        loop {
            let read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| PlaybackError::NetworkFetch {
                    track_id: track_id.to_string(),
                    message: format!("failed to read response body: {}", e),
                })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            writer
                .write_all(&buffer[..read])
                .await
                .map_err(|e| PlaybackError::Storage(format!("failed to write audio file: {}", e)))?;
            total += read as u64;
        }

        writer
            .shutdown()
            .await
            .map_err(|e| PlaybackError::Storage(format!("failed to flush audio file: {}", e)))?;

        if let Some(expected) = content_length {
            if total != expected {
                return Err(PlaybackError::NetworkFetch {
                    track_id: track_id.to_string(),
                    message: format!("body truncated: received {} of {} bytes", total, expected),
                });
            }
        }

        Ok((total, hex::encode(hasher.finalize())))
    }

    /// Artwork is best effort; failures are logged and the slot stays usable.
    async fn fetch_artwork(&self, track_id: &str, ctx: &PrefetchContext) -> Option<PathBuf> {
        let locator = match ctx.media_source.resolve_artwork(track_id).await {
            Ok(Some(locator)) => locator,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Artwork lookup failed");
                return None;
            }
        };

        let body = match ctx.content_fetcher.fetch(&locator).await {
            Ok(response) => response.into_bytes(ctx.config.max_artwork_bytes).await,
            Err(e) => Err(e),
        };

        match body {
            Ok(data) => match ctx.file_system.write_file(&self.artwork_path, data).await {
                Ok(()) => Some(self.artwork_path.clone()),
                Err(e) => {
                    warn!(error = %e, "Failed to store artwork");
                    None
                }
            },
            Err(e) => {
                warn!(url = %redact_url(&locator.url), error = %e, "Artwork download failed");
                None
            }
        }
    }

    fn commit(&self, generation: u64, fetched: Fetched) -> MaterializeOutcome {
        let mut state = self.state.lock();
        if state.released || state.generation != generation {
            debug!("Discarding result for superseded generation");
            return MaterializeOutcome::Superseded;
        }
        state.handle = Some(fetched.handle);
        state.artwork_path = fetched.artwork_path;
        state.stale = false;
        state.materialized_at = Some(Utc::now());
        state.last_error = None;
        MaterializeOutcome::Ready {
            bytes: fetched.bytes,
        }
    }

    /// Drops the slot's content and deletes its storage directory.
    ///
    /// Idempotent; storage that is already gone counts as released.
    #[instrument(skip_all, fields(slot = self.number))]
    pub async fn release(&self, file_system: &dyn FileSystemAccess) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.released = true;
            state.stale = true;
            state.handle = None;
            state.artwork_path = None;
            state.materialized_at = None;
        }

        let _storage = self.storage_lock.lock().await;
        match file_system.delete_dir_all(&self.storage_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(storage_error("release slot storage", e)),
        }
    }
}

struct Fetched {
    bytes: u64,
    handle: MediaHandle,
    artwork_path: Option<PathBuf>,
}

fn storage_error(action: &str, error: bridge_traits::BridgeError) -> PlaybackError {
    PlaybackError::Storage(format!("failed to {}: {}", action, error))
}
