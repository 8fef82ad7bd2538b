//! # Core Runtime Module
//!
//! Shared infrastructure for the queue engine:
//! - Logging and tracing bootstrap
//! - Capability wiring with fail-fast validation
//! - The event bus the engine publishes queue, prefetch and playback events on

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
