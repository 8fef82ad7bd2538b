//! Task spawning.
//!
//! Prefetch workers run as independent tasks on the multi-threaded
//! executor; file probing that blocks on `std::fs` goes through
//! [`spawn_blocking`].

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a future onto the current runtime.
///
/// The task may run on any worker thread, so both the future and its
/// output must be `Send`.
///
/// ```rust
/// use core_async::task::spawn;
///
/// # async fn example() {
/// let handle = spawn(async { 42 });
/// assert_eq!(handle.await.ok(), Some(42));
/// # }
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for joined tasks.
pub type Result<T> = std::result::Result<T, JoinError>;
