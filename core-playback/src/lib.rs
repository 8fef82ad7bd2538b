//! # Queue Navigation & Prefetch Engine
//!
//! Plays an ordered catalog of remote tracks while hiding network latency
//! behind three rotating buffer slots.
//!
//! ## Overview
//!
//! This module handles:
//! - Pending/history bookkeeping and navigation ([`QueueNavigator`])
//! - Slot materialization with per-slot generation guards ([`BufferSlot`])
//! - Background prefetch workers ([`PrefetchTask`])
//! - Constant-time role rotation ([`SlotRing`])
//! - Optional file probing with Symphonia (`symphonia-loader` feature)

pub mod catalog;
pub mod config;
#[cfg(feature = "symphonia-loader")]
pub mod decoder;
pub mod error;
pub mod navigator;
pub mod prefetch;
pub mod rotation;
pub mod slot;

pub use catalog::{Track, TrackCatalog, TrackId};
pub use config::{PrefetchConfig, SLOT_COUNT};
#[cfg(feature = "symphonia-loader")]
pub use decoder::SymphoniaLoader;
pub use error::{PlaybackError, Result};
pub use navigator::{NavigationOutcome, PlaybackToggle, QueueNavigator, QueueSnapshot, RoleSnapshot};
pub use prefetch::{PrefetchContext, PrefetchTask};
pub use rotation::{Direction, SlotRing, SlotRole};
pub use slot::{BindOutcome, BufferSlot, MaterializeJob, MaterializeOutcome, ReadyContent, SlotSnapshot};
