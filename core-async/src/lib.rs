//! Async facade for the gapless-queue crates.
//!
//! Every other crate in the workspace reaches the executor through this
//! crate instead of depending on tokio directly, so the set of primitives
//! the engine relies on stays small and visible in one place.
//!
//! # Modules
//!
//! - `task`: spawning prefetch workers and blocking probes
//! - `sync`: locks, channels and cancellation tokens
//! - `time`: sleeps and timeouts
//! - `io`: the byte-stream traits content fetchers hand out
//! - `runtime`: a `block_on` helper for synchronous call sites
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::task;
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!     let handle = task::spawn(async move {
//!         child.cancelled().await;
//!         "stopped"
//!     });
//!     token.cancel();
//!     assert_eq!(handle.await.ok(), Some("stopped"));
//! }
//! ```

pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Waits on several futures and runs the branch of the first to finish.
pub use tokio::select;
