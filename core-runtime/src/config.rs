//! # Core Configuration Module
//!
//! Wires host capabilities into a [`CoreConfig`] with a builder that fails
//! fast when something required is missing.
//!
//! ## Required Capabilities
//!
//! - `MediaSource` - resolves track identifiers to locators
//! - `MediaLoader` - turns slot files into playable handles
//! - `PlaybackController` - plays handles and reports end-of-track
//!
//! ## Capabilities with Desktop Defaults
//!
//! - `ContentFetcher` - desktop default: `ReqwestContentFetcher`
//! - `FileSystemAccess` - desktop default: `TokioFileSystem`
//!
//! Defaults are only injected when the `desktop-shims` feature is enabled;
//! otherwise every capability must be supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_source(Arc::new(MySignedUrls::new(session)))
//!     .media_loader(Arc::new(MyDecoder))
//!     .playback_controller(Arc::new(MyAudioEngine))
//!     .buffer_root("/var/cache/player/queue")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{
    ContentFetcher, FileSystemAccess, MediaLoader, MediaSource, PlaybackController,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Capabilities and shared infrastructure for one queue engine.
#[derive(Clone)]
pub struct CoreConfig {
    pub media_source: Arc<dyn MediaSource>,
    pub content_fetcher: Arc<dyn ContentFetcher>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub media_loader: Arc<dyn MediaLoader>,
    pub playback_controller: Arc<dyn PlaybackController>,
    /// Parent of the three slot directories. `None` means "below the
    /// file system's cache directory".
    pub buffer_root: Option<PathBuf>,
    pub event_bus: EventBus,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(root) = &self.buffer_root {
            if root.as_os_str().is_empty() {
                return Err(Error::Config("Buffer root cannot be an empty path".to_string()));
            }
            if root.parent().is_none() {
                return Err(Error::Config(format!(
                    "Buffer root {} would place slot storage at a filesystem root",
                    root.display()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("buffer_root", &self.buffer_root)
            .field("event_bus", &self.event_bus)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_source: Option<Arc<dyn MediaSource>>,
    content_fetcher: Option<Arc<dyn ContentFetcher>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    media_loader: Option<Arc<dyn MediaLoader>>,
    playback_controller: Option<Arc<dyn PlaybackController>>,
    buffer_root: Option<PathBuf>,
    event_bus: Option<EventBus>,
}

impl CoreConfigBuilder {
    pub fn media_source(mut self, source: Arc<dyn MediaSource>) -> Self {
        self.media_source = Some(source);
        self
    }

    /// Overrides the desktop default fetcher.
    pub fn content_fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.content_fetcher = Some(fetcher);
        self
    }

    /// Overrides the desktop default file system.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn media_loader(mut self, loader: Arc<dyn MediaLoader>) -> Self {
        self.media_loader = Some(loader);
        self
    }

    pub fn playback_controller(mut self, controller: Arc<dyn PlaybackController>) -> Self {
        self.playback_controller = Some(controller);
        self
    }

    pub fn buffer_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.buffer_root = Some(root.into());
        self
    }

    /// Shares an existing bus; a fresh one is created otherwise.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let media_source = self.media_source.ok_or_else(|| {
            missing(
                "MediaSource",
                "A MediaSource is required to resolve playable locators. \
                 Inject an implementation backed by the host's account session.",
            )
        })?;

        let media_loader = self.media_loader.ok_or_else(|| {
            missing(
                "MediaLoader",
                "A MediaLoader is required to turn slot storage into playable handles. \
                 Enable core-playback's 'symphonia-loader' feature or inject the host decoder.",
            )
        })?;

        let playback_controller = self.playback_controller.ok_or_else(|| {
            missing(
                "PlaybackController",
                "A PlaybackController is required to render audio and report end-of-track.",
            )
        })?;

        let content_fetcher = match self.content_fetcher {
            Some(fetcher) => fetcher,
            None => provide_default_content_fetcher()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            media_source,
            content_fetcher,
            file_system,
            media_loader,
            playback_controller,
            buffer_root: self.buffer_root,
            event_bus: self.event_bus.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

fn missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_content_fetcher() -> Result<Arc<dyn ContentFetcher>> {
    let fetcher = bridge_desktop::ReqwestContentFetcher::new()?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_content_fetcher() -> Result<Arc<dyn ContentFetcher>> {
    Err(missing(
        "ContentFetcher",
        "A ContentFetcher is required to download track bytes. \
         Desktop: enable the 'desktop-shims' feature to use ReqwestContentFetcher. \
         Other hosts: inject a platform-native fetcher.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(missing(
        "FileSystemAccess",
        "A FileSystemAccess implementation is required for slot storage. \
         Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
         Other hosts: inject sandboxed storage.",
    ))
}
