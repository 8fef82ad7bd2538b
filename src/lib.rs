//! Gapless queue facade.
//!
//! Re-exports the queue engine together with the capability traits a host
//! implements and the runtime configuration used to wire them. Enable
//! `desktop-shims` to get default file system and HTTP implementations, and
//! `symphonia-loader` for the bundled file prober.

pub use bridge_traits as capabilities;
pub use core_playback::*;
pub use core_runtime::{events, logging, CoreConfig, CoreConfigBuilder, EventBus, EventStream};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestContentFetcher, TokioFileSystem};
