//! # Desktop Bridge Implementations
//!
//! Default capability implementations for desktop hosts (macOS, Windows,
//! Linux):
//! - `FileSystemAccess` using `tokio::fs`, rooted in the platform cache directory
//! - `ContentFetcher` using `reqwest` with streaming bodies
//!
//! Media sources, loaders and playback controllers are host specific and
//! always injected.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestContentFetcher, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::Result<()> {
//!     let fetcher = ReqwestContentFetcher::new()?;
//!     let fs = TokioFileSystem::new();
//!     // hand both to core_runtime::CoreConfig::builder()
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestContentFetcher;
