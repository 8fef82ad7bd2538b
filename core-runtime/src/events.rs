//! # Event Bus System
//!
//! Typed, broadcast events describing what the queue engine is doing, so a
//! presentation layer can follow navigation and prefetch progress without
//! polling the navigator.
//!
//! ## Overview
//!
//! - **Event Types**: [`QueueEvent`], [`PrefetchEvent`] and [`PlaybackEvent`],
//!   wrapped in [`CoreEvent`]
//! - **EventBus**: broadcast channel the engine publishes into
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌───────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ QueueNavigator├────────>│           ├────────────>│ Subscriber │
//! └───────────────┘         │ EventBus  │             └────────────┘
//! ┌───────────────┐  emit   │           │  subscribe  ┌────────────┐
//! │PrefetchWorker ├────────>│           ├────────────>│ Subscriber │
//! └───────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PrefetchEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut failures = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Prefetch(PrefetchEvent::Failed { .. })));
//!
//! bus.emit(CoreEvent::Prefetch(PrefetchEvent::Failed {
//!     slot: 2,
//!     track_id: "track-c".to_string(),
//!     generation: 4,
//!     message: "connection reset".to_string(),
//!     recoverable: true,
//! }))
//! .ok();
//!
//! assert!(failures.recv().await.is_ok());
//! # }
//! ```
//!
//! Emitting with no subscribers returns an error; publishers in the engine
//! ignore it with `.ok()`.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Pending/history changes and navigation results
    Queue(QueueEvent),
    /// Slot materialization progress
    Prefetch(PrefetchEvent),
    /// Playback controller interactions
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Prefetch(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Prefetch(PrefetchEvent::Failed {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Prefetch(PrefetchEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Queue(QueueEvent::BoundaryReached { .. }) => EventSeverity::Info,
            CoreEvent::Queue(_) | CoreEvent::Playback(_) => EventSeverity::Info,
            CoreEvent::Prefetch(_) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Queue Events
// ============================================================================

/// Navigation results. Counts describe the queue after the change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// First track made current.
    Started {
        track_id: String,
        pending: usize,
        history: usize,
    },
    /// Moved forward one track.
    Advanced {
        track_id: String,
        pending: usize,
        history: usize,
    },
    /// Moved back one track.
    Rewound {
        track_id: String,
        pending: usize,
        history: usize,
    },
    /// Current track replayed from the start.
    Restarted { track_id: String },
    /// Navigation requested past either end; nothing changed.
    BoundaryReached {
        /// `"next"` or `"previous"`.
        direction: String,
    },
    /// Navigator closed and slot storage released.
    Closed,
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Started { .. } => "Queue started",
            QueueEvent::Advanced { .. } => "Advanced to next track",
            QueueEvent::Rewound { .. } => "Went back to previous track",
            QueueEvent::Restarted { .. } => "Restarted current track",
            QueueEvent::BoundaryReached { .. } => "Queue boundary reached",
            QueueEvent::Closed => "Queue closed",
        }
    }
}

// ============================================================================
// Prefetch Events
// ============================================================================

/// Slot materialization progress. `slot` is the 1-based physical slot number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PrefetchEvent {
    Started {
        slot: u8,
        /// Role the slot held when the worker was started.
        role: String,
        track_id: String,
        generation: u64,
    },
    Completed {
        slot: u8,
        track_id: String,
        generation: u64,
        bytes: u64,
        elapsed_ms: u64,
    },
    Failed {
        slot: u8,
        track_id: String,
        generation: u64,
        message: String,
        /// Whether a later rotation onto the same track may succeed.
        recoverable: bool,
    },
    /// Work finished or stopped after the slot was rebound; the result was discarded.
    Superseded {
        slot: u8,
        track_id: String,
        generation: u64,
    },
}

impl PrefetchEvent {
    fn description(&self) -> &str {
        match self {
            PrefetchEvent::Started { .. } => "Prefetch started",
            PrefetchEvent::Completed { .. } => "Prefetch completed",
            PrefetchEvent::Failed { .. } => "Prefetch failed",
            PrefetchEvent::Superseded { .. } => "Prefetch superseded",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Started { track_id: String, title: String },
    Paused { track_id: String },
    Resumed { track_id: String },
    /// Controller reported end-of-track.
    Completed { track_id: String },
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` creates an
/// independent receiver that sees events published after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender has been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
