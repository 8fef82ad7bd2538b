//! # Host Bridge Traits
//!
//! Capability traits the queue engine calls but never implements itself.
//!
//! ## Traits
//!
//! - [`MediaSource`](media::MediaSource) - resolve a track identifier to a fetchable locator
//! - [`ContentFetcher`](http::ContentFetcher) - stream the bytes behind a locator
//! - [`FileSystemAccess`](storage::FileSystemAccess) - private per-slot storage
//! - [`MediaLoader`](playback::MediaLoader) - turn stored bytes into a playable handle
//! - [`PlaybackController`](playback::PlaybackController) - play, pause and report end-of-track
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to the host
//!
//! Desktop implementations of the storage and fetcher traits live in
//! `bridge-desktop`. Hosts inject the rest through `core_runtime::CoreConfig`,
//! which fails fast when a required capability is missing.
//!
//! ## Error Handling
//!
//! Every trait reports failures as [`BridgeError`](error::BridgeError).
//! Implementations should map platform errors to the most specific variant:
//! the engine treats `Unauthorized` as fatal to starting playback, and
//! `Network`/`Certificate` as per-fetch failures that only leave a slot stale.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; prefetch workers call them from
//! concurrently running tasks.

pub mod error;
pub mod http;
pub mod logging;
pub mod media;
pub mod playback;
pub mod storage;

pub use error::{BridgeError, Result};
pub use http::{ByteStream, ContentFetcher, FetchResponse};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{MediaLocator, MediaSource};
pub use playback::{
    AudioCodec, AudioFormat, EndOfTrackNotifier, MediaHandle, MediaLoader, PlaybackController,
    PlaybackMetadata, PlaybackRequest, PlaybackSessionId,
};
pub use storage::FileSystemAccess;
