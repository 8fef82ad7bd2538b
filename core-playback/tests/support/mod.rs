//! In-memory capabilities for driving the navigator in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{ContentFetcher, FetchResponse};
use bridge_traits::media::{MediaLocator, MediaSource};
use bridge_traits::playback::{
    EndOfTrackNotifier, MediaHandle, MediaLoader, PlaybackController, PlaybackRequest,
    PlaybackSessionId,
};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_async::io::AsyncWrite;
use core_playback::{PrefetchConfig, QueueNavigator, Track, TrackCatalog};
use core_runtime::{CoreConfig, EventBus};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const BUFFER_ROOT: &str = "/buffers";

// ============================================================================
// File system
// ============================================================================

type Files = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Files,
    dirs: Mutex<HashSet<PathBuf>>,
    failing_deletes: Mutex<HashSet<PathBuf>>,
}

impl MemoryFileSystem {
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    /// Every stored file and directory at or below `root`.
    pub fn entries_under(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let root = root.as_ref();
        let mut entries: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .chain(self.dirs.lock().iter())
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect();
        entries.sort();
        entries
    }

    pub fn fail_delete(&self, path: impl Into<PathBuf>) {
        self.failing_deletes.lock().insert(path.into());
    }
}

struct MemoryWriter {
    path: PathBuf,
    files: Files,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.files
            .lock()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(PathBuf::from("/cache"))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        self.file(path)
            .map(Bytes::from)
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        self.files.lock().insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            files: Arc::clone(&self.files),
        }))
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        if self.failing_deletes.lock().contains(path) {
            return Err(BridgeError::PermissionDenied(path.display().to_string()));
        }
        let mut files = self.files.lock();
        let mut dirs = self.dirs.lock();
        let before = files.len() + dirs.len();
        files.retain(|file, _| !file.starts_with(path));
        dirs.retain(|dir| !dir.starts_with(path));
        if files.len() + dirs.len() == before {
            return Err(BridgeError::NotFound(path.display().to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Media source and fetcher
// ============================================================================

fn track_of(url: &str) -> String {
    let rest = url.trim_start_matches("mem://");
    let rest = rest.trim_start_matches("art/");
    rest.split('?').next().unwrap_or(rest).to_string()
}

pub fn audio_body(track_id: &str) -> Vec<u8> {
    format!("audio-bytes-for-{}", track_id).into_bytes()
}

#[derive(Default)]
pub struct ScriptedSource {
    denied: Mutex<HashSet<String>>,
    artwork: Mutex<HashSet<String>>,
}

impl ScriptedSource {
    pub fn deny(&self, track_id: &str) {
        self.denied.lock().insert(track_id.to_string());
    }

    pub fn with_artwork(&self, track_id: &str) {
        self.artwork.lock().insert(track_id.to_string());
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn resolve_locator(&self, track_id: &str) -> Result<MediaLocator> {
        if self.denied.lock().contains(track_id) {
            return Err(BridgeError::Unauthorized("session expired".to_string()));
        }
        Ok(MediaLocator::new(format!("mem://{}?token=secret", track_id)).bearer_token("secret"))
    }

    async fn resolve_artwork(&self, track_id: &str) -> Result<Option<MediaLocator>> {
        if self.artwork.lock().contains(track_id) {
            Ok(Some(MediaLocator::new(format!("mem://art/{}", track_id))))
        } else {
            Ok(None)
        }
    }
}

/// Serves `audio_body(track)` for every locator, with per-track failures and gates.
#[derive(Default)]
pub struct ScriptedFetcher {
    failures: Mutex<HashMap<String, BridgeError>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn fail_with(&self, track_id: &str, error: BridgeError) {
        self.failures.lock().insert(track_id.to_string(), error);
    }

    pub fn clear_failure(&self, track_id: &str) {
        self.failures.lock().remove(track_id);
    }

    /// Holds fetches of `track_id` until [`ScriptedFetcher::open_gate`] is called.
    pub fn close_gate(&self, track_id: &str) {
        self.gates
            .lock()
            .insert(track_id.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn open_gate(&self, track_id: &str) {
        if let Some(gate) = self.gates.lock().remove(track_id) {
            gate.add_permits(1024);
        }
    }

    pub fn fetch_count(&self, track_id: &str) -> usize {
        self.fetches.lock().get(track_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &MediaLocator) -> Result<FetchResponse> {
        let is_artwork = locator.url.starts_with("mem://art/");
        let track_id = track_of(&locator.url);
        if is_artwork {
            return Ok(FetchResponse::from_bytes(format!("art-{}", track_id).into_bytes()));
        }

        *self.fetches.lock().entry(track_id.clone()).or_default() += 1;

        let gate = self.gates.lock().get(&track_id).cloned();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        }

        if let Some(error) = self.failures.lock().get(&track_id) {
            return Err(match error {
                BridgeError::Certificate(m) => BridgeError::Certificate(m.clone()),
                BridgeError::Unauthorized(m) => BridgeError::Unauthorized(m.clone()),
                other => BridgeError::Network(other.to_string()),
            });
        }

        Ok(FetchResponse::from_bytes(audio_body(&track_id)))
    }
}

// ============================================================================
// Loader and controller
// ============================================================================

/// Loads whatever the slot wrote and remembers which bytes it saw.
pub struct MemoryLoader {
    fs: Arc<MemoryFileSystem>,
    loads: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl MemoryLoader {
    pub fn new(fs: Arc<MemoryFileSystem>) -> Self {
        Self {
            fs,
            loads: Mutex::new(Vec::new()),
        }
    }

    pub fn loads(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.loads.lock().clone()
    }
}

#[async_trait]
impl MediaLoader for MemoryLoader {
    async fn load(&self, path: &Path) -> Result<MediaHandle> {
        let data = self
            .fs
            .file(path)
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))?;
        self.loads.lock().push((path.to_path_buf(), data));
        Ok(MediaHandle::new(path))
    }
}

#[derive(Debug, Clone)]
pub struct PlayedTrack {
    pub session: PlaybackSessionId,
    pub track_id: String,
    pub path: PathBuf,
    pub artwork: Option<PathBuf>,
}

#[derive(Default)]
pub struct RecordingController {
    played: Mutex<Vec<PlayedTrack>>,
    notifiers: Mutex<HashMap<PlaybackSessionId, EndOfTrackNotifier>>,
    playing: Mutex<HashMap<PlaybackSessionId, bool>>,
    stopped: Mutex<Vec<PlaybackSessionId>>,
    status_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl RecordingController {
    pub fn played(&self) -> Vec<PlayedTrack> {
        self.played.lock().clone()
    }

    pub fn played_ids(&self) -> Vec<String> {
        self.played.lock().iter().map(|p| p.track_id.clone()).collect()
    }

    pub fn last_session(&self) -> Option<PlaybackSessionId> {
        self.played.lock().last().map(|p| p.session)
    }

    pub fn stopped(&self) -> Vec<PlaybackSessionId> {
        self.stopped.lock().clone()
    }

    /// Makes `is_playing` block until [`RecordingController::release_status`].
    pub fn hold_status(&self) {
        *self.status_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_status(&self) {
        if let Some(gate) = self.status_gate.lock().take() {
            gate.add_permits(1024);
        }
    }

    /// Reports end-of-track for `session` the way a real controller would.
    pub fn finish(&self, session: PlaybackSessionId) -> bool {
        self.notifiers
            .lock()
            .get(&session)
            .map(|notifier| notifier.notify())
            .unwrap_or(false)
    }
}

#[async_trait]
impl PlaybackController for RecordingController {
    async fn play(&self, request: PlaybackRequest, on_end: EndOfTrackNotifier) -> Result<()> {
        self.played.lock().push(PlayedTrack {
            session: request.session,
            track_id: request.metadata.track_id.clone().unwrap_or_default(),
            path: request.handle.path.clone(),
            artwork: request.metadata.artwork_path.clone(),
        });
        self.notifiers.lock().insert(request.session, on_end);
        self.playing.lock().insert(request.session, true);
        Ok(())
    }

    async fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        self.playing.lock().insert(session, false);
        Ok(())
    }

    async fn resume(&self, session: PlaybackSessionId) -> Result<()> {
        self.playing.lock().insert(session, true);
        Ok(())
    }

    async fn stop(&self, session: PlaybackSessionId) -> Result<()> {
        self.playing.lock().insert(session, false);
        self.stopped.lock().push(session);
        Ok(())
    }

    async fn is_playing(&self, session: PlaybackSessionId) -> Result<bool> {
        let gate = self.status_gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        }
        Ok(self.playing.lock().get(&session).copied().unwrap_or(false))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub fs: Arc<MemoryFileSystem>,
    pub source: Arc<ScriptedSource>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub loader: Arc<MemoryLoader>,
    pub controller: Arc<RecordingController>,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        let fs = Arc::new(MemoryFileSystem::default());
        Self {
            loader: Arc::new(MemoryLoader::new(Arc::clone(&fs))),
            fs,
            source: Arc::new(ScriptedSource::default()),
            fetcher: Arc::new(ScriptedFetcher::default()),
            controller: Arc::new(RecordingController::default()),
            events: EventBus::new(256),
        }
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig::builder()
            .media_source(self.source.clone())
            .content_fetcher(self.fetcher.clone())
            .file_system(self.fs.clone())
            .media_loader(self.loader.clone())
            .playback_controller(self.controller.clone())
            .buffer_root(BUFFER_ROOT)
            .event_bus(self.events.clone())
            .build()
            .expect("all capabilities provided")
    }

    pub async fn navigator(&self, ids: &[&str]) -> QueueNavigator {
        self.navigator_with(ids, PrefetchConfig::default()).await
    }

    pub async fn navigator_with(&self, ids: &[&str], config: PrefetchConfig) -> QueueNavigator {
        QueueNavigator::new(catalog(ids), self.core_config(), config)
            .await
            .expect("navigator builds")
    }
}

pub fn catalog(ids: &[&str]) -> TrackCatalog {
    TrackCatalog::from_tracks(
        ids.iter()
            .map(|id| Track::new(*id, format!("Title {}", id)).with_artist("Artist")),
    )
}

pub fn ids(values: &[&str]) -> Vec<core_playback::TrackId> {
    values.iter().map(|v| core_playback::TrackId::from(*v)).collect()
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

pub fn slot_dir(number: u8) -> PathBuf {
    Path::new(BUFFER_ROOT)
        .join("queue-buffers")
        .join(format!("buffer{}", number))
}
