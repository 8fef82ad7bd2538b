//! # Queue Navigator
//!
//! Owns the pending and history sequences, decides which track is current and
//! drives the three buffer slots.
//!
//! ## Ordering
//!
//! Pending starts out in catalog order and is consumed from its end, so the
//! last catalog entry plays first. History grows on every navigation and its
//! last element is the current track once the queue has started.
//!
//! ## Slot roles
//!
//! - CURRENT holds `history.last()`
//! - NEXT holds `pending.last()`, parked when pending is empty
//! - PREVIOUS holds the second-to-last history entry, parked when there is none
//!
//! Navigation rotates the role mapping so that two of the three slots keep
//! their content; only the slot that changed purpose is refetched.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let navigator = Arc::new(QueueNavigator::new(catalog, core_config, PrefetchConfig::default()).await?);
//! navigator.spawn_end_of_track_listener();
//! navigator.start().await?;
//! navigator.next().await?;
//! navigator.close().await?;
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use bridge_traits::playback::{
    EndOfTrackNotifier, PlaybackController, PlaybackMetadata, PlaybackRequest, PlaybackSessionId,
};
use core_async::sync::{mpsc, CancellationToken, Mutex as AsyncMutex};
use core_async::task::JoinHandle;
use core_runtime::events::{CoreEvent, PlaybackEvent, QueueEvent};
use core_runtime::CoreConfig;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{Track, TrackCatalog, TrackId};
use crate::config::{PrefetchConfig, SLOT_COUNT};
use crate::error::{PlaybackError, Result};
use crate::prefetch::{PrefetchContext, PrefetchTask};
use crate::rotation::{Direction, SlotRing, SlotRole};
use crate::slot::{BufferSlot, MaterializeOutcome, SlotSnapshot};

/// Result of a navigation request that was legal to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The given track is now current and playing.
    Navigated(TrackId),
    /// Nothing to move to in the requested direction; state unchanged.
    BoundaryReached,
}

/// What `toggle_play_pause` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackToggle {
    Started(TrackId),
    Paused,
    Resumed,
}

/// Slot state for one role.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoleSnapshot {
    pub role: SlotRole,
    pub slot: SlotSnapshot,
}

/// Queue and slot state at one instant.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub current: Option<TrackId>,
    pub pending: Vec<TrackId>,
    pub history: Vec<TrackId>,
    pub slots: Vec<RoleSnapshot>,
    pub closed: bool,
}

struct NavigatorState {
    pending: Vec<TrackId>,
    history: Vec<TrackId>,
    ring: SlotRing,
    tasks: [Option<PrefetchTask>; SLOT_COUNT],
    session: Option<PlaybackSessionId>,
    closed: bool,
}

impl NavigatorState {
    fn is_started(&self) -> bool {
        !self.history.is_empty()
    }

    fn current(&self) -> Option<&TrackId> {
        self.history.last()
    }
}

/// Sole authority over which track is current.
pub struct QueueNavigator {
    catalog: Arc<TrackCatalog>,
    ctx: Arc<PrefetchContext>,
    controller: Arc<dyn PlaybackController>,
    slots: [Arc<BufferSlot>; SLOT_COUNT],
    buffer_root: PathBuf,
    /// Cancelled by `close()` before it waits for the state lock; parent of
    /// every worker's token.
    shutdown: CancellationToken,
    state: AsyncMutex<NavigatorState>,
    end_of_track_tx: mpsc::UnboundedSender<PlaybackSessionId>,
    end_of_track_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<PlaybackSessionId>>>,
}

impl QueueNavigator {
    /// Builds a navigator over `catalog`.
    ///
    /// Slot storage lives under `core.buffer_root` or, when unset, under the
    /// file system's cache directory, in `config.storage_directory`.
    ///
    /// CURRENT is bound to the first track to play and NEXT to the one after
    /// it; both start downloading right away.
    pub async fn new(catalog: TrackCatalog, core: CoreConfig, config: PrefetchConfig) -> Result<Self> {
        if catalog.is_empty() {
            return Err(PlaybackError::Config(
                "track catalog must contain at least one track".to_string(),
            ));
        }
        core.validate()?;
        config.validate().map_err(PlaybackError::Config)?;

        let base = match &core.buffer_root {
            Some(root) => root.clone(),
            None => core.file_system.get_cache_directory().await.map_err(|e| {
                PlaybackError::Storage(format!("failed to locate cache directory: {}", e))
            })?,
        };
        let buffer_root = base.join(&config.storage_directory);

        let slots = [1u8, 2, 3].map(|number| Arc::new(BufferSlot::new(number, &buffer_root, &config)));
        let pending = catalog.ids().to_vec();
        let (end_of_track_tx, end_of_track_rx) = mpsc::unbounded_channel();

        info!(
            tracks = catalog.len(),
            root = %buffer_root.display(),
            "Queue navigator created"
        );

        let navigator = Self {
            catalog: Arc::new(catalog),
            controller: Arc::clone(&core.playback_controller),
            ctx: Arc::new(PrefetchContext::from_core(&core, config)),
            slots,
            buffer_root,
            shutdown: CancellationToken::new(),
            state: AsyncMutex::new(NavigatorState {
                pending,
                history: Vec::new(),
                ring: SlotRing::new(),
                tasks: [None, None, None],
                session: None,
                closed: false,
            }),
            end_of_track_tx,
            end_of_track_rx: parking_lot::Mutex::new(Some(end_of_track_rx)),
        };

        {
            let mut state = navigator.state.lock().await;
            navigator.align_slots(&state)?;
            navigator.schedule_prefetch(&mut state);
        }
        Ok(navigator)
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    /// Directory holding the three slot directories.
    pub fn buffer_root(&self) -> &std::path::Path {
        &self.buffer_root
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Makes the last pending track current and plays it.
    ///
    /// Fails with `InvalidState` when called twice or after `close()`.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<TrackId> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await
    }

    /// Advances to the next pending track.
    #[instrument(skip(self))]
    pub async fn next(&self) -> Result<NavigationOutcome> {
        let mut state = self.state.lock().await;
        self.ensure_started(&state)?;
        self.advance_locked(&mut state).await
    }

    /// Goes back to the previously played track.
    #[instrument(skip(self))]
    pub async fn previous(&self) -> Result<NavigationOutcome> {
        let mut state = self.state.lock().await;
        self.ensure_started(&state)?;

        if state.history.len() < 2 {
            debug!(history = state.history.len(), "No previous track");
            self.emit(CoreEvent::Queue(QueueEvent::BoundaryReached {
                direction: Direction::Backward.as_str().to_string(),
            }));
            return Ok(NavigationOutcome::BoundaryReached);
        }

        if let Some(current) = state.history.pop() {
            state.pending.push(current);
        }
        let refreshed = state.ring.rotate(Direction::Backward);
        debug!(slot = self.slots[refreshed].number(), "Rotated backward");
        self.align_slots(&state)?;

        let track_id = self.play_current(&mut state).await?;
        info!(track_id = %track_id, "Went back to previous track");
        self.emit(CoreEvent::Queue(QueueEvent::Rewound {
            track_id: track_id.to_string(),
            pending: state.pending.len(),
            history: state.history.len(),
        }));
        Ok(NavigationOutcome::Navigated(track_id))
    }

    /// Replays the current track from the start without touching the slots.
    #[instrument(skip(self))]
    pub async fn restart(&self) -> Result<TrackId> {
        let mut state = self.state.lock().await;
        self.ensure_started(&state)?;

        let track_id = self.play_current(&mut state).await?;
        info!(track_id = %track_id, "Restarted current track");
        self.emit(CoreEvent::Queue(QueueEvent::Restarted {
            track_id: track_id.to_string(),
        }));
        Ok(track_id)
    }

    /// Pauses or resumes the active session; starts the queue if needed.
    #[instrument(skip(self))]
    pub async fn toggle_play_pause(&self) -> Result<PlaybackToggle> {
        let (session, track_id) = {
            let mut state = self.state.lock().await;
            self.ensure_open(&state)?;

            if !state.is_started() {
                return self.start_locked(&mut state).await.map(PlaybackToggle::Started);
            }

            let Some(session) = state.session else {
                let track_id = self.play_current(&mut state).await?;
                return Ok(PlaybackToggle::Started(track_id));
            };
            let track_id = state.current().map(|id| id.to_string()).unwrap_or_default();
            (session, track_id)
        };

        let playing = self
            .controller
            .is_playing(session)
            .await
            .map_err(|e| PlaybackError::Playback(e.to_string()))?;

        if playing {
            self.controller
                .pause(session)
                .await
                .map_err(|e| PlaybackError::Playback(e.to_string()))?;
            self.emit(CoreEvent::Playback(PlaybackEvent::Paused { track_id }));
            Ok(PlaybackToggle::Paused)
        } else {
            self.controller
                .resume(session)
                .await
                .map_err(|e| PlaybackError::Playback(e.to_string()))?;
            self.emit(CoreEvent::Playback(PlaybackEvent::Resumed { track_id }));
            Ok(PlaybackToggle::Resumed)
        }
    }

    /// Stops playback and releases every slot's storage.
    ///
    /// Idempotent. All three releases are attempted even when one fails; the
    /// first failure is returned.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        // Unblocks a navigation that is still waiting on CURRENT.
        self.shutdown.cancel();
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        for task in state.tasks.iter_mut() {
            if let Some(task) = task.take() {
                task.cancel();
            }
        }

        if let Some(session) = state.session.take() {
            if let Err(e) = self.controller.stop(session).await {
                warn!(error = %e, "Failed to stop playback while closing");
            }
        }

        let mut first_error = None;
        for slot in &self.slots {
            if let Err(e) = slot.release(self.ctx.file_system.as_ref()).await {
                warn!(slot = slot.number(), error = %e, "Failed to release slot storage");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.ctx.file_system.delete_dir_all(&self.buffer_root).await {
            if !e.is_not_found() {
                warn!(error = %e, "Failed to remove buffer root");
            }
        }

        info!("Queue closed");
        self.emit(CoreEvent::Queue(QueueEvent::Closed));
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Metadata of the current track, `None` before `start()`.
    pub async fn current_track(&self) -> Option<Arc<Track>> {
        let state = self.state.lock().await;
        state.current().and_then(|id| self.catalog.get(id))
    }

    /// Whether the active session is playing; `None` when there is no session.
    pub async fn is_playing(&self) -> Result<Option<bool>> {
        let session = self.state.lock().await.session;
        match session {
            Some(session) => self
                .controller
                .is_playing(session)
                .await
                .map(Some)
                .map_err(|e| PlaybackError::Playback(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn pending(&self) -> Vec<TrackId> {
        self.state.lock().await.pending.clone()
    }

    pub async fn history(&self) -> Vec<TrackId> {
        self.state.lock().await.history.clone()
    }

    /// True once `close()` has been called, even while it is still running.
    pub async fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Track bound to the slot that holds `role`, `None` if that slot is parked.
    pub async fn slot_binding(&self, role: SlotRole) -> Option<TrackId> {
        let state = self.state.lock().await;
        self.slots[state.ring.slot_for(role)]
            .bound_track()
            .map(|track| track.id.clone())
    }

    pub async fn slot_snapshot(&self, role: SlotRole) -> SlotSnapshot {
        let state = self.state.lock().await;
        self.slots[state.ring.slot_for(role)].snapshot()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            current: state.current().cloned(),
            pending: state.pending.clone(),
            history: state.history.clone(),
            slots: SlotRole::ALL
                .iter()
                .map(|&role| RoleSnapshot {
                    role,
                    slot: self.slots[state.ring.slot_for(role)].snapshot(),
                })
                .collect(),
            closed: state.closed,
        }
    }

    /// Waits for the background worker of `role`'s slot, if one is running.
    ///
    /// Only needed by callers that want NEXT/PREVIOUS to be warm; navigation
    /// itself never waits on those slots.
    ///
    /// The task stays in the navigator's table while it runs, so navigation in
    /// the meantime never starts a second worker for the same slot. Returns
    /// `None` when the slot has no worker, or when navigation claimed the
    /// result first.
    pub async fn wait_for_prefetch(&self, role: SlotRole) -> Option<Result<MaterializeOutcome>> {
        let index = self.state.lock().await.ring.slot_for(role);
        loop {
            let mut completion = {
                let mut state = self.state.lock().await;
                if state.tasks[index].as_ref()?.has_completed() {
                    let task = state.tasks[index].take()?;
                    return Some(task.join().await);
                }
                state.tasks[index].as_ref()?.completion()
            };
            if completion.wait_for(|done| *done).await.is_err() {
                // Worker died before signalling; let the runtime reap it.
                core_async::task::yield_now().await;
            }
        }
    }

    // ========================================================================
    // End of track
    // ========================================================================

    /// Consumes end-of-track notifications and advances the queue.
    ///
    /// Returns `None` if a listener was already spawned. The listener holds
    /// only a weak reference and exits once the navigator is dropped or closed.
    pub fn spawn_end_of_track_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut receiver = self.end_of_track_rx.lock().take()?;
        let navigator: Weak<Self> = Arc::downgrade(self);

        Some(core_async::spawn(async move {
            while let Some(session) = receiver.recv().await {
                let Some(navigator) = navigator.upgrade() else {
                    break;
                };
                if navigator.is_closed().await {
                    break;
                }
                if let Err(e) = navigator.handle_end_of_track(session).await {
                    warn!(error = %e, "Failed to advance after end of track");
                }
            }
            debug!("End-of-track listener stopped");
        }))
    }

    /// Advances the queue if `session` is the active one. Notifications for
    /// older sessions are ignored and return `Ok(None)`.
    #[instrument(skip(self))]
    pub async fn handle_end_of_track(&self, session: PlaybackSessionId) -> Result<Option<NavigationOutcome>> {
        let mut state = self.state.lock().await;
        if state.closed || self.shutdown.is_cancelled() || state.session != Some(session) {
            debug!("Ignoring end of track for inactive session");
            return Ok(None);
        }
        state.session = None;

        if let Some(track_id) = state.current() {
            self.emit(CoreEvent::Playback(PlaybackEvent::Completed {
                track_id: track_id.to_string(),
            }));
        }

        self.advance_locked(&mut state).await.map(Some)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_open(&self, state: &NavigatorState) -> Result<()> {
        if state.closed || self.shutdown.is_cancelled() {
            return Err(closed());
        }
        Ok(())
    }

    fn ensure_started(&self, state: &NavigatorState) -> Result<()> {
        self.ensure_open(state)?;
        if !state.is_started() {
            return Err(PlaybackError::InvalidState("queue has not been started".to_string()));
        }
        Ok(())
    }

    async fn start_locked(&self, state: &mut NavigatorState) -> Result<TrackId> {
        self.ensure_open(state)?;
        if state.is_started() {
            return Err(PlaybackError::InvalidState("queue already started".to_string()));
        }

        let first = state
            .pending
            .pop()
            .ok_or_else(|| PlaybackError::Internal("pending queue is empty".to_string()))?;
        state.history.push(first);
        self.align_slots(state)?;

        let track_id = self.play_current(state).await?;
        info!(track_id = %track_id, pending = state.pending.len(), "Queue started");
        self.emit(CoreEvent::Queue(QueueEvent::Started {
            track_id: track_id.to_string(),
            pending: state.pending.len(),
            history: state.history.len(),
        }));
        Ok(track_id)
    }

    async fn advance_locked(&self, state: &mut NavigatorState) -> Result<NavigationOutcome> {
        let Some(next) = state.pending.pop() else {
            debug!("No pending tracks");
            self.emit(CoreEvent::Queue(QueueEvent::BoundaryReached {
                direction: Direction::Forward.as_str().to_string(),
            }));
            return Ok(NavigationOutcome::BoundaryReached);
        };

        state.history.push(next);
        let refreshed = state.ring.rotate(Direction::Forward);
        debug!(slot = self.slots[refreshed].number(), "Rotated forward");
        self.align_slots(state)?;

        let track_id = self.play_current(state).await?;
        info!(track_id = %track_id, "Advanced to next track");
        self.emit(CoreEvent::Queue(QueueEvent::Advanced {
            track_id: track_id.to_string(),
            pending: state.pending.len(),
            history: state.history.len(),
        }));
        Ok(NavigationOutcome::Navigated(track_id))
    }

    /// Binds each role's slot to the track the queue expects there. After a
    /// rotation only the refreshed slot changes; the others are reused.
    ///
    /// Before `start()` CURRENT holds the first track to play, so that
    /// starting finds both CURRENT and NEXT already bound.
    fn align_slots(&self, state: &NavigatorState) -> Result<()> {
        let (history, pending) = (&state.history, &state.pending);
        let wanted = if state.is_started() {
            [
                (SlotRole::Current, history.last()),
                (SlotRole::Next, pending.last()),
                (SlotRole::Previous, second_last(history)),
            ]
        } else {
            [
                (SlotRole::Current, pending.last()),
                (SlotRole::Next, second_last(pending)),
                (SlotRole::Previous, None),
            ]
        };

        for (role, track_id) in wanted {
            let slot = &self.slots[state.ring.slot_for(role)];
            match track_id {
                Some(id) => {
                    let track = self.track(id)?;
                    let outcome = slot.bind(track);
                    debug!(slot = slot.number(), role = %role, track_id = %id, ?outcome, "Bound slot");
                }
                None => slot.park(),
            }
        }
        Ok(())
    }

    fn track(&self, id: &TrackId) -> Result<Arc<Track>> {
        self.catalog
            .get(id)
            .ok_or_else(|| PlaybackError::TrackNotFound(id.to_string()))
    }

    /// Cancels workers whose slot moved to a new generation and starts one
    /// for every stale slot that has none.
    fn schedule_prefetch(&self, state: &mut NavigatorState) {
        for role in SlotRole::ALL {
            let index = state.ring.slot_for(role);
            let slot = &self.slots[index];

            if let Some(task) = state.tasks[index].take() {
                if task.generation() != slot.generation() {
                    debug!(slot = slot.number(), track_id = %task.track_id(), "Cancelling outdated prefetch");
                    task.cancel();
                } else if !task.is_finished() {
                    state.tasks[index] = Some(task);
                    continue;
                }
            }

            let spawned =
                PrefetchTask::spawn_scoped(Arc::clone(slot), role, Arc::clone(&self.ctx), &self.shutdown);
            if let Some(task) = spawned {
                state.tasks[index] = Some(task);
            }
        }
    }

    /// Waits for CURRENT to be materialized and hands it to the controller.
    async fn play_current(&self, state: &mut NavigatorState) -> Result<TrackId> {
        let track_id = state
            .current()
            .cloned()
            .ok_or_else(|| PlaybackError::InvalidState("no current track".to_string()))?;

        if let Some(session) = state.session.take() {
            if let Err(e) = self.controller.stop(session).await {
                warn!(error = %e, "Failed to stop previous session");
            }
        }

        self.schedule_prefetch(state);

        let index = state.ring.slot_for(SlotRole::Current);
        if let Some(task) = state.tasks[index].take() {
            match task.join().await {
                Ok(MaterializeOutcome::Cancelled) if self.shutdown.is_cancelled() => {
                    debug!(track_id = %track_id, "Queue closed while waiting for current track");
                    return Err(closed());
                }
                Ok(_) => {}
                Err(e) => {
                    error!(track_id = %track_id, error = %e, "Current track could not be materialized");
                    self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                        track_id: Some(track_id.to_string()),
                        message: e.to_string(),
                        recoverable: e.is_transient(),
                    }));
                    return Err(e);
                }
            }
        }
        if self.shutdown.is_cancelled() {
            return Err(closed());
        }

        let content = self.slots[index]
            .ready_content()
            .filter(|content| content.track.id == track_id)
            .ok_or_else(|| PlaybackError::NotReady(track_id.to_string()))?;

        let track = &content.track;
        let metadata = PlaybackMetadata {
            track_id: Some(track.id.to_string()),
            title: Some(track.title.clone()),
            artist: track.artist.clone(),
            album: track.album.clone(),
            artwork_path: content.artwork_path.clone(),
            extra: track.extra.clone(),
        };
        let request = PlaybackRequest::new(content.handle.clone()).with_metadata(metadata);
        let session = request.session;
        let notifier = EndOfTrackNotifier::new(session, self.end_of_track_tx.clone());

        self.controller
            .play(request, notifier)
            .await
            .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        state.session = Some(session);

        self.emit(CoreEvent::Playback(PlaybackEvent::Started {
            track_id: track_id.to_string(),
            title: track.title.clone(),
        }));
        Ok(track_id)
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.ctx.events.emit(event);
    }
}

fn second_last(ids: &[TrackId]) -> Option<&TrackId> {
    ids.len().checked_sub(2).and_then(|i| ids.get(i))
}

fn closed() -> PlaybackError {
    PlaybackError::InvalidState("queue is closed".to_string())
}

impl Drop for QueueNavigator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
