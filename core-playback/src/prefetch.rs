//! # Prefetch Workers
//!
//! One [`PrefetchTask`] runs one slot's materialization on the runtime. The
//! navigator keeps at most one task per slot, joins only the CURRENT slot's
//! task and lets NEXT/PREVIOUS work finish in the background.

use std::sync::Arc;

use bridge_traits::{ContentFetcher, FileSystemAccess, MediaLoader, MediaSource};
use core_async::sync::{watch, CancellationToken};
use core_async::task::JoinHandle;
use core_async::time::Instant;
use core_runtime::events::{CoreEvent, EventBus, PrefetchEvent};
use core_runtime::CoreConfig;
use tracing::{debug, instrument, warn};

use crate::catalog::TrackId;
use crate::config::PrefetchConfig;
use crate::error::{PlaybackError, Result};
use crate::rotation::SlotRole;
use crate::slot::{BufferSlot, MaterializeJob, MaterializeOutcome};

/// Capabilities and settings shared by every worker.
pub struct PrefetchContext {
    pub media_source: Arc<dyn MediaSource>,
    pub content_fetcher: Arc<dyn ContentFetcher>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub media_loader: Arc<dyn MediaLoader>,
    pub config: PrefetchConfig,
    pub events: EventBus,
}

impl PrefetchContext {
    pub fn from_core(core: &CoreConfig, config: PrefetchConfig) -> Self {
        Self {
            media_source: Arc::clone(&core.media_source),
            content_fetcher: Arc::clone(&core.content_fetcher),
            file_system: Arc::clone(&core.file_system),
            media_loader: Arc::clone(&core.media_loader),
            config,
            events: core.event_bus.clone(),
        }
    }

    fn emit(&self, event: PrefetchEvent) {
        let _ = self.events.emit(CoreEvent::Prefetch(event));
    }
}

/// Handle to one in-flight materialization.
#[derive(Debug)]
pub struct PrefetchTask {
    slot: u8,
    track_id: TrackId,
    generation: u64,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
    handle: JoinHandle<Result<MaterializeOutcome>>,
}

impl PrefetchTask {
    /// Starts refreshing `slot` if it is stale. Returns `None` when there is
    /// nothing to fetch.
    pub fn spawn(slot: Arc<BufferSlot>, role: SlotRole, ctx: Arc<PrefetchContext>) -> Option<Self> {
        Self::spawn_with(slot, role, ctx, CancellationToken::new())
    }

    /// Like [`PrefetchTask::spawn`], but the worker also stops when `parent`
    /// is cancelled.
    pub fn spawn_scoped(
        slot: Arc<BufferSlot>,
        role: SlotRole,
        ctx: Arc<PrefetchContext>,
        parent: &CancellationToken,
    ) -> Option<Self> {
        Self::spawn_with(slot, role, ctx, parent.child_token())
    }

    fn spawn_with(
        slot: Arc<BufferSlot>,
        role: SlotRole,
        ctx: Arc<PrefetchContext>,
        cancel: CancellationToken,
    ) -> Option<Self> {
        let job = slot.pending_job()?;
        let number = slot.number();
        let track_id = job.track.id.clone();
        let generation = job.generation;

        debug!(slot = number, role = %role, track_id = %track_id, generation, "Starting prefetch");
        ctx.emit(PrefetchEvent::Started {
            slot: number,
            role: role.as_str().to_string(),
            track_id: track_id.to_string(),
            generation,
        });

        let (done_tx, done) = watch::channel(false);
        let handle = core_async::spawn(run(slot, job, ctx, cancel.clone(), done_tx));

        Some(Self {
            slot: number,
            track_id,
            generation,
            cancel,
            done,
            handle,
        })
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// True once the worker has produced its result, even if the runtime has
    /// not yet reaped the task.
    pub fn has_completed(&self) -> bool {
        *self.done.borrow() || self.handle.is_finished()
    }

    /// Completion signal that can be awaited without owning the task.
    pub fn completion(&self) -> watch::Receiver<bool> {
        self.done.clone()
    }

    /// Asks the worker to stop. The slot's generation guard discards
    /// anything it still manages to produce.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the worker's result.
    pub async fn join(self) -> Result<MaterializeOutcome> {
        let slot = self.slot;
        self.handle.await.map_err(|e| {
            PlaybackError::Internal(format!("prefetch worker for slot {} failed: {}", slot, e))
        })?
    }
}

#[instrument(skip_all, fields(slot = slot.number(), track_id = %job.track.id, generation = job.generation))]
async fn run(
    slot: Arc<BufferSlot>,
    job: MaterializeJob,
    ctx: Arc<PrefetchContext>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
) -> Result<MaterializeOutcome> {
    let started = Instant::now();
    let result = slot.materialize(&job, &ctx, &cancel).await;
    let number = slot.number();
    let track_id = job.track.id.to_string();

    match &result {
        Ok(MaterializeOutcome::Ready { bytes }) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            debug!(bytes, elapsed_ms, "Prefetch completed");
            ctx.emit(PrefetchEvent::Completed {
                slot: number,
                track_id,
                generation: job.generation,
                bytes: *bytes,
                elapsed_ms,
            });
        }
        Ok(MaterializeOutcome::Superseded) | Ok(MaterializeOutcome::Cancelled) => {
            debug!(outcome = ?result, "Prefetch result discarded");
            ctx.emit(PrefetchEvent::Superseded {
                slot: number,
                track_id,
                generation: job.generation,
            });
        }
        Err(e) => {
            warn!(error = %e, "Prefetch failed");
            ctx.emit(PrefetchEvent::Failed {
                slot: number,
                track_id,
                generation: job.generation,
                message: e.to_string(),
                recoverable: e.is_transient(),
            });
        }
    }

    let _ = done.send(true);
    result
}
